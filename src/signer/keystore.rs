//! Credential-store backend.
//!
//! The key reference is a directory. The first private-key entry in lexical
//! order is used: `*.p8` files hold PKCS#8 DER, `*.pem` files PKCS#8 PEM.
//! The signing call hashes the block itself.

use std::path::PathBuf;

use p256::ecdsa::signature::RandomizedSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use rand_core::OsRng;
use tracing::debug;

use super::{Backend, KeyMaterial, MeasuredWindow, Signer, SignerError, MAX_DER_LEN};

const DER_EXTENSION: &str = "p8";
const PEM_EXTENSION: &str = "pem";

/// P-256 signer using the first key found in a credential directory.
pub struct KeystoreSigner {
    key: SigningKey,
}

impl KeystoreSigner {
    /// First private-key entry of the store, if any.
    fn first_entry(store: &KeyMaterial) -> Result<Option<PathBuf>, SignerError> {
        let entries = std::fs::read_dir(store.path()).map_err(|e| store.io_error(e))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| store.io_error(e))?.path();
            let is_key = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == DER_EXTENSION || ext == PEM_EXTENSION);
            if is_key && path.is_file() {
                candidates.push(path);
            }
        }

        candidates.sort();
        Ok(candidates.into_iter().next())
    }
}

impl Signer for KeystoreSigner {
    type Prepared = Vec<u8>;
    type Response = Signature;

    const BACKEND: Backend = Backend::Keystore;
    const WINDOW: MeasuredWindow = MeasuredWindow::DigestAndSign;

    fn load_key(key: &KeyMaterial) -> Result<Self, SignerError> {
        let entry = Self::first_entry(key)?.ok_or_else(|| SignerError::EmptyKeyStore {
            path: key.path().to_path_buf(),
        })?;
        let material = KeyMaterial::new(&entry);

        let signing_key = if entry.extension().is_some_and(|ext| ext == DER_EXTENSION) {
            let der = std::fs::read(&entry).map_err(|e| material.io_error(e))?;
            SigningKey::from_pkcs8_der(&der)
        } else {
            SigningKey::from_pkcs8_pem(&material.read_to_string()?)
        }
        .map_err(|e| SignerError::KeyRejected(format!("{}: {}", entry.display(), e)))?;

        debug!("using key {} from store {}", entry.display(), key.path().display());
        Ok(Self { key: signing_key })
    }

    fn max_signature_len(&self) -> usize {
        MAX_DER_LEN
    }

    fn prepare(&mut self, block: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(block.to_vec())
    }

    #[inline]
    fn sign(&mut self, block: &Vec<u8>) -> Result<Signature, SignerError> {
        let signature: Signature = self
            .key
            .try_sign_with_rng(&mut OsRng, block)
            .map_err(|e| SignerError::SignRejected(e.to_string()))?;
        Ok(signature)
    }

    fn encode(&self, signature: Signature, out: &mut Vec<u8>) -> Result<(), SignerError> {
        out.extend_from_slice(signature.to_der().as_bytes());
        Ok(())
    }
}
