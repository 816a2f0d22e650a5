//! Structured-response backend.
//!
//! The block is passed to the signer as an already hashed value, so the
//! measured window holds signing only. After the window closes, `encode`
//! renders the signature as the canonical S-expression
//! `(sig-val (ecdsa (r <mpi>) (s <mpi>)))`, pulls `r` and `s` back out by
//! name and writes each left-padded to the field size, giving a fixed
//! `2 * field_size` bytes per record.

use p256::ecdsa::signature::hazmat::RandomizedPrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use rand_core::OsRng;
use tracing::debug;

use super::{Backend, KeyMaterial, MeasuredWindow, Signer, SignerError};
use crate::keyfile::TagValueKey;
use crate::sexp::Sexp;

/// P-256 signer keyed from a tag/value file, producing fixed-width output.
pub struct SexpSigner {
    key: SigningKey,
    field_size: usize,
}

impl Signer for SexpSigner {
    type Prepared = Vec<u8>;
    type Response = Signature;

    const BACKEND: Backend = Backend::Sexp;
    const WINDOW: MeasuredWindow = MeasuredWindow::SignOnly;

    fn load_key(key: &KeyMaterial) -> Result<Self, SignerError> {
        let text = key.read_to_string()?;
        let parsed = TagValueKey::parse(&text)?;
        let signing_key = SigningKey::from_slice(&parsed.d)
            .map_err(|e| SignerError::KeyRejected(e.to_string()))?;

        debug!(
            "loaded {} key from {}, field size {}",
            parsed.curve,
            key.path().display(),
            parsed.baseline
        );
        Ok(Self {
            key: signing_key,
            field_size: parsed.baseline,
        })
    }

    fn max_signature_len(&self) -> usize {
        2 * self.field_size
    }

    fn prepare(&mut self, block: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(block.to_vec())
    }

    #[inline]
    fn sign(&mut self, block: &Vec<u8>) -> Result<Signature, SignerError> {
        let signature: Signature = self
            .key
            .sign_prehash_with_rng(&mut OsRng, block)
            .map_err(|e| SignerError::SignRejected(e.to_string()))?;
        Ok(signature)
    }

    fn encode(&self, signature: Signature, out: &mut Vec<u8>) -> Result<(), SignerError> {
        let (r, s) = signature.split_bytes();
        let response = signature_response(&r, &s).to_canonical();
        extract_fixed_width(&response, self.field_size, out)
    }
}

/// Build `(sig-val (ecdsa (r r) (s s)))` with minimal big-endian integers.
fn signature_response(r: &[u8], s: &[u8]) -> Sexp {
    Sexp::list(vec![
        Sexp::atom("sig-val"),
        Sexp::list(vec![
            Sexp::atom("ecdsa"),
            Sexp::list(vec![Sexp::atom("r"), Sexp::atom(strip_leading_zeros(r))]),
            Sexp::list(vec![Sexp::atom("s"), Sexp::atom(strip_leading_zeros(s))]),
        ]),
    ])
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Append `r || s` from a canonical signature response to `out`, each
/// left-padded with zeros to `field_size` bytes.
///
/// Fails with [`SignerError::MissingComponent`] if `sig-val`, `ecdsa`, `r` or
/// `s` cannot be found, and with [`SignerError::OversizedComponent`] if a
/// value has more than `field_size` significant bytes. `out` is left
/// unchanged on error.
pub fn extract_fixed_width(
    response: &[u8],
    field_size: usize,
    out: &mut Vec<u8>,
) -> Result<(), SignerError> {
    let sexp = Sexp::parse_canonical(response)?;
    let sig_val = sexp
        .find_token("sig-val")
        .ok_or(SignerError::MissingComponent { token: "sig-val" })?;
    let ecdsa = sig_val
        .find_token("ecdsa")
        .ok_or(SignerError::MissingComponent { token: "ecdsa" })?;

    let mut components = [&[][..]; 2];
    for (slot, token) in components.iter_mut().zip(["r", "s"]) {
        let value = ecdsa
            .find_token(token)
            .and_then(|list| list.nth_data(1))
            .ok_or(SignerError::MissingComponent { token })?;
        let value = strip_leading_zeros(value);
        if value.len() > field_size {
            return Err(SignerError::OversizedComponent {
                token,
                len: value.len(),
                field_size,
            });
        }
        *slot = value;
    }

    for value in components {
        out.resize(out.len() + field_size - value.len(), 0);
        out.extend_from_slice(value);
    }
    Ok(())
}
