//! Error types for a measurement run.
//!
//! Every error is fatal: a failed run stops at the first error, reports it
//! once and cleans up. Nothing is retried, since repeating a signing call
//! would change the sequence of measurements.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::signer::SignerError;

/// Failure class of a run, independent of where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Invalid configuration, detected before any file is touched.
    Config,
    /// A stream could not be opened/created/read, or key material could not be read.
    Resource,
    /// The input ended inside a block.
    Truncation,
    /// The backend rejected key loading or a signing call.
    Crypto,
    /// The backend response lacked an expected component.
    Encoding,
    /// An output stream did not accept a whole record.
    Write,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Config => "configuration",
            FailureKind::Resource => "resource",
            FailureKind::Truncation => "truncation",
            FailureKind::Crypto => "crypto",
            FailureKind::Encoding => "encoding",
            FailureKind::Write => "write",
        };
        f.write_str(name)
    }
}

/// One of the three streams owned by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Data blocks to sign.
    Input,
    /// Concatenated signatures.
    Signatures,
    /// Concatenated 8-byte tick deltas.
    Timings,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stream::Input => "input",
            Stream::Signatures => "signatures",
            Stream::Timings => "timings",
        };
        f.write_str(name)
    }
}

/// Error that ends a measurement run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A stream could not be opened or created.
    #[error("can't open {stream} file {}: {source}", .path.display())]
    Open {
        /// Which stream.
        stream: Stream,
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The final input chunk is a partial block.
    #[error(
        "read less data than expected (truncated file?): read {read} bytes instead of {expected} for record {record}"
    )]
    Truncated {
        /// Index of the block that was cut short.
        record: u64,
        /// Bytes actually read.
        read: usize,
        /// Configured block size.
        expected: usize,
    },

    /// Reading the input failed.
    #[error("read error on input at record {record}: {source}")]
    Read {
        /// Index of the block being read.
        record: u64,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The key session could not be created.
    #[error("can't load key: {0}")]
    KeyLoad(#[source] SignerError),

    /// A per-block backend step failed.
    #[error("{operation} failed at record {record}: {source}")]
    Signer {
        /// `prepare`, `sign` or `encode`.
        operation: &'static str,
        /// Index of the block being processed.
        record: u64,
        /// Backend error.
        #[source]
        source: SignerError,
    },

    /// An output stream did not accept a whole record.
    #[error("write error on {stream} at record {record} ({len} bytes): {source}")]
    Write {
        /// Which output.
        stream: Stream,
        /// Index of the record being written.
        record: u64,
        /// Record length in bytes.
        len: usize,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl HarnessError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            HarnessError::Config(_) => FailureKind::Config,
            HarnessError::Open { .. } | HarnessError::Read { .. } => FailureKind::Resource,
            HarnessError::Truncated { .. } => FailureKind::Truncation,
            HarnessError::KeyLoad(source) | HarnessError::Signer { source, .. } => source.kind(),
            HarnessError::Write { .. } => FailureKind::Write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_message_has_counts() {
        let err = HarnessError::Truncated {
            record: 3,
            read: 31,
            expected: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("read 31 bytes instead of 32"), "{}", msg);
        assert!(msg.contains("record 3"), "{}", msg);
        assert_eq!(err.kind(), FailureKind::Truncation);
    }

    #[test]
    fn test_signer_error_kind_passes_through() {
        let err = HarnessError::Signer {
            operation: "encode",
            record: 0,
            source: SignerError::MissingComponent { token: "s" },
        };
        assert_eq!(err.kind(), FailureKind::Encoding);

        let err = HarnessError::KeyLoad(SignerError::KeyRejected("bad".into()));
        assert_eq!(err.kind(), FailureKind::Crypto);
    }

    #[test]
    fn test_open_error_is_resource() {
        let err = HarnessError::Open {
            stream: Stream::Input,
            path: PathBuf::from("/nonexistent"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.kind(), FailureKind::Resource);
        assert!(err.to_string().contains("can't open input file /nonexistent"));
    }
}
