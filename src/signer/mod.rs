//! Signing backends.
//!
//! Each backend is a [`Signer`]: a key session created once per run that
//! signs one block at a time. The harness splits every block into three
//! steps and times only the middle one:
//!
//! 1. [`Signer::prepare`] builds the backend input (digest context, copy of
//!    the block) outside the measured window.
//! 2. [`Signer::sign`] performs exactly one backend signing call. It borrows
//!    the prepared input so that freeing it happens after the window closes,
//!    and returns the backend's fixed-size result without allocating.
//! 3. [`Signer::encode`] turns the backend response into output bytes.
//!
//! What the middle step covers differs per backend and is reported through
//! [`Signer::WINDOW`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::FailureKind;
use crate::keyfile::KeyFileError;
use crate::sexp::SexpError;

mod deterministic;
mod keystore;
mod pem;
mod sexp;

pub use deterministic::DeterministicSigner;
pub use keystore::KeystoreSigner;
pub use pem::PemSigner;
pub use sexp::{extract_fixed_width, SexpSigner};

/// Byte length of a P-256 field element.
pub const FIELD_SIZE: usize = 32;

/// Shortest block the `sexp` backend can sign as a prehash.
pub const MIN_PREHASH_LEN: usize = FIELD_SIZE / 2;

/// Upper bound on a DER-encoded P-256 signature.
pub const MAX_DER_LEN: usize = 72;

/// Selectable signing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Backend {
    /// RFC 6979 nonces, PKCS#8 PEM key, DER output.
    Deterministic,
    /// Random nonces via `ring`, PKCS#8 PEM key, DER output.
    Pem,
    /// Random nonces, tag/value key file, fixed-width `r || s` output.
    Sexp,
    /// Random nonces, key taken from a credential directory, DER output.
    Keystore,
}

impl Backend {
    /// All backends, in CLI order.
    pub const ALL: [Backend; 4] = [
        Backend::Deterministic,
        Backend::Pem,
        Backend::Sexp,
        Backend::Keystore,
    ];

    /// Identifier used on the command line and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Deterministic => "deterministic",
            Backend::Pem => "pem",
            Backend::Sexp => "sexp",
            Backend::Keystore => "keystore",
        }
    }

    /// Measured window of this backend.
    pub fn window(&self) -> MeasuredWindow {
        match self {
            Backend::Deterministic => DeterministicSigner::WINDOW,
            Backend::Pem => PemSigner::WINDOW,
            Backend::Sexp => SexpSigner::WINDOW,
            Backend::Keystore => KeystoreSigner::WINDOW,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Backend work bracketed by the cycle counter.
///
/// Backends hash inside their signing call to different degrees, so samples
/// are only comparable within one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasuredWindow {
    /// The block is signed as a prehashed value; no digest work is timed.
    SignOnly,
    /// The digest is absorbed beforehand; finalization and signing are timed.
    DigestFinalizeAndSign,
    /// Hashing the whole block and signing are timed.
    DigestAndSign,
}

impl MeasuredWindow {
    /// Whether any SHA-256 work falls inside the window.
    pub fn includes_digest(&self) -> bool {
        !matches!(self, MeasuredWindow::SignOnly)
    }
}

impl fmt::Display for MeasuredWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasuredWindow::SignOnly => "sign only",
            MeasuredWindow::DigestFinalizeAndSign => "digest finalize + sign",
            MeasuredWindow::DigestAndSign => "digest + sign",
        };
        f.write_str(name)
    }
}

/// Backend-specific reference to private key material.
///
/// For file-based backends this is the key file, for `keystore` a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    path: PathBuf,
}

impl KeyMaterial {
    /// Reference key material at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the key material.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the key file as text.
    pub fn read_to_string(&self) -> Result<String, SignerError> {
        std::fs::read_to_string(&self.path).map_err(|source| self.io_error(source))
    }

    pub(crate) fn io_error(&self, source: io::Error) -> SignerError {
        SignerError::KeyMaterial {
            path: self.path.clone(),
            source,
        }
    }
}

/// Error raised by a signing backend.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Key material could not be read.
    #[error("can't read key material {}: {source}", .path.display())]
    KeyMaterial {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The backend refused the key.
    #[error("key rejected: {0}")]
    KeyRejected(String),

    /// The tag/value key file is malformed.
    #[error("malformed key file: {0}")]
    KeyFile(#[from] KeyFileError),

    /// A credential directory held no private key.
    #[error("no private key in {}", .path.display())]
    EmptyKeyStore {
        /// Directory searched.
        path: PathBuf,
    },

    /// The backend refused to sign.
    #[error("signing rejected: {0}")]
    SignRejected(String),

    /// A named component is absent from the backend response.
    #[error("response has no '{token}' component")]
    MissingComponent {
        /// Token searched for.
        token: &'static str,
    },

    /// A component does not fit the fixed output width.
    #[error("'{token}' component is {len} bytes, field size is {field_size}")]
    OversizedComponent {
        /// Component name.
        token: &'static str,
        /// Its significant length.
        len: usize,
        /// Output width per component.
        field_size: usize,
    },

    /// The backend response could not be parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] SexpError),
}

impl SignerError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            SignerError::KeyMaterial { .. } => FailureKind::Resource,
            SignerError::KeyRejected(_)
            | SignerError::KeyFile(_)
            | SignerError::EmptyKeyStore { .. }
            | SignerError::SignRejected(_) => FailureKind::Crypto,
            SignerError::MissingComponent { .. }
            | SignerError::OversizedComponent { .. }
            | SignerError::MalformedResponse(_) => FailureKind::Encoding,
        }
    }
}

/// A loaded key session able to sign single blocks.
///
/// The session is created once, used for every block of a run and dropped
/// exactly once afterwards. Backend crates zeroize secret scalars on drop.
pub trait Signer: Sized {
    /// Per-block input built by [`prepare`](Signer::prepare).
    type Prepared;

    /// Raw backend answer produced by [`sign`](Signer::sign).
    type Response;

    /// Backend identifier.
    const BACKEND: Backend;

    /// Work bracketed by the timer.
    const WINDOW: MeasuredWindow;

    /// Create the key session.
    fn load_key(key: &KeyMaterial) -> Result<Self, SignerError>;

    /// Largest number of bytes [`encode`](Signer::encode) appends.
    fn max_signature_len(&self) -> usize;

    /// Build the backend input for `block`. Not timed.
    fn prepare(&mut self, block: &[u8]) -> Result<Self::Prepared, SignerError>;

    /// Perform one backend signing invocation. Timed.
    ///
    /// Must not allocate or free on success.
    fn sign(&mut self, prepared: &Self::Prepared) -> Result<Self::Response, SignerError>;

    /// Append the output encoding of `response` to `out`. Not timed.
    fn encode(&self, response: Self::Response, out: &mut Vec<u8>) -> Result<(), SignerError>;
}

#[cfg(test)]
pub(crate) mod test_keys {
    //! Key material generated at test time.

    use std::path::Path;

    use p256::ecdsa::{SigningKey, VerifyingKey};
    use p256::pkcs8::{EncodePrivateKey, LineEnding};
    use p256::SecretKey;
    use rand_core::OsRng;

    /// Fresh P-256 key.
    pub fn generate() -> SecretKey {
        SecretKey::random(&mut OsRng)
    }

    /// Public half of `secret`.
    pub fn verifying_key(secret: &SecretKey) -> VerifyingKey {
        *SigningKey::from(secret).verifying_key()
    }

    /// Write `secret` as PKCS#8 PEM.
    pub fn write_pem(secret: &SecretKey, path: &Path) {
        let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        std::fs::write(path, pem.as_bytes()).unwrap();
    }

    /// Write `secret` as PKCS#8 DER.
    pub fn write_der(secret: &SecretKey, path: &Path) {
        let der = secret.to_pkcs8_der().unwrap();
        std::fs::write(path, der.as_bytes()).unwrap();
    }

    /// Write `secret` as a tag/value key file.
    pub fn write_tag_value(secret: &SecretKey, path: &Path) {
        let text = format!(
            "curve=NIST P-256\nd={}\nb=32\n",
            hex::encode(secret.to_bytes())
        );
        std::fs::write(path, text).unwrap();
    }
}
