//! Run configuration.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::signer::{Backend, KeyMaterial, MIN_PREHASH_LEN};

/// Default block size in bytes: one SHA-256 digest.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

/// Invalid configuration, reported before any file is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `block_size` is zero.
    #[error("block_size must be positive")]
    ZeroBlockSize,

    /// The backend signs blocks as prehashes and `block_size` is too short
    /// for one.
    #[error("{backend} backend needs block_size of at least {min}, got {block_size}")]
    BlockTooShort {
        /// Backend that imposes the minimum.
        backend: Backend,
        /// Configured block size.
        block_size: usize,
        /// Smallest accepted block size.
        min: usize,
    },

    /// A required path was left empty.
    #[error("{field} path must not be empty")]
    EmptyPath {
        /// Name of the field.
        field: &'static str,
    },
}

/// Configuration of one measurement run.
///
/// Every field except `block_size`, `backend` and `limit` must be set.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Signing backend.
    pub backend: Backend,

    /// File of input blocks.
    pub input: PathBuf,

    /// Output file for concatenated signatures. Created or truncated.
    pub signatures: PathBuf,

    /// Output file for 8-byte native-endian tick deltas. Created or truncated.
    pub timings: PathBuf,

    /// Backend-specific key reference.
    pub key: KeyMaterial,

    /// Bytes per block. Default: 32.
    pub block_size: usize,

    /// Stop after this many blocks. Default: None (read to end of input).
    pub limit: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Deterministic,
            input: PathBuf::new(),
            signatures: PathBuf::new(),
            timings: PathBuf::new(),
            key: KeyMaterial::new(PathBuf::new()),
            block_size: DEFAULT_BLOCK_SIZE,
            limit: None,
        }
    }
}

impl RunConfig {
    /// Create a configuration with all paths set and default options.
    pub fn new(
        backend: Backend,
        input: impl Into<PathBuf>,
        signatures: impl Into<PathBuf>,
        timings: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            input: input.into(),
            signatures: signatures.into(),
            timings: timings.into(),
            key: KeyMaterial::new(key),
            ..Self::default()
        }
    }

    /// Set the block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Stop after `blocks` records.
    pub fn limit(mut self, blocks: u64) -> Self {
        self.limit = Some(blocks);
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for(self.backend)
    }

    /// Check the configuration as a run of `backend`.
    pub fn validate_for(&self, backend: Backend) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if backend == Backend::Sexp && self.block_size < MIN_PREHASH_LEN {
            return Err(ConfigError::BlockTooShort {
                backend,
                block_size: self.block_size,
                min: MIN_PREHASH_LEN,
            });
        }
        let paths: [(&'static str, &Path); 4] = [
            ("input", self.input.as_path()),
            ("signatures", self.signatures.as_path()),
            ("timings", self.timings.as_path()),
            ("key", self.key.path()),
        ];
        for (field, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyPath { field });
            }
        }
        Ok(())
    }
}
