//! RFC 6979 deterministic-nonce backend.
//!
//! The digest context absorbs the block during `prepare`; the timed call
//! finalizes it and signs. Identical key and input always give identical
//! output.

use p256::ecdsa::signature::DigestSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Backend, KeyMaterial, MeasuredWindow, Signer, SignerError, MAX_DER_LEN};

/// P-256 signer with deterministic nonces and DER output.
pub struct DeterministicSigner {
    key: SigningKey,
}

impl Signer for DeterministicSigner {
    type Prepared = Sha256;
    type Response = Signature;

    const BACKEND: Backend = Backend::Deterministic;
    const WINDOW: MeasuredWindow = MeasuredWindow::DigestFinalizeAndSign;

    fn load_key(key: &KeyMaterial) -> Result<Self, SignerError> {
        let pem = key.read_to_string()?;
        let signing_key =
            SigningKey::from_pkcs8_pem(&pem).map_err(|e| SignerError::KeyRejected(e.to_string()))?;
        debug!("loaded PKCS#8 key from {}", key.path().display());
        Ok(Self { key: signing_key })
    }

    fn max_signature_len(&self) -> usize {
        MAX_DER_LEN
    }

    fn prepare(&mut self, block: &[u8]) -> Result<Sha256, SignerError> {
        Ok(Sha256::new_with_prefix(block))
    }

    #[inline]
    fn sign(&mut self, digest: &Sha256) -> Result<Signature, SignerError> {
        let signature: Signature = self
            .key
            .try_sign_digest(digest.clone())
            .map_err(|e| SignerError::SignRejected(e.to_string()))?;
        Ok(signature)
    }

    fn encode(&self, signature: Signature, out: &mut Vec<u8>) -> Result<(), SignerError> {
        out.extend_from_slice(signature.to_der().as_bytes());
        Ok(())
    }
}
