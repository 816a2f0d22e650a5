//! Readers for the output streams of a run.
//!
//! The streams have no headers or delimiters:
//!
//! - timings: 8-byte unsigned tick deltas in native byte order
//! - DER signatures: back-to-back `SEQUENCE`s, split by their length headers
//! - fixed-width signatures: `2 * field_size` bytes per record
//!
//! Downstream analysis loads the streams with these functions and pairs
//! records by position.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::harness::TIMING_RECORD_LEN;

const DER_SEQUENCE: u8 = 0x30;

/// Error from loading or splitting an output stream.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The file could not be read.
    #[error("can't read {}: {source}", .path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Stream length is not a multiple of the record length.
    #[error("stream of {len} bytes is not a whole number of {record_len}-byte records")]
    Misaligned {
        /// Stream length.
        len: usize,
        /// Record length.
        record_len: usize,
    },

    /// Zero record width requested.
    #[error("record width must be positive")]
    ZeroWidth,

    /// A DER signature header is malformed or runs past the end.
    #[error("malformed DER signature at offset {offset}")]
    MalformedDer {
        /// Offset of the offending record.
        offset: usize,
    },
}

/// Load a timing stream.
pub fn read_timings(path: &Path) -> Result<Vec<u64>, RecordError> {
    let bytes = std::fs::read(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_timings(&bytes)
}

/// Decode timing records from raw bytes.
pub fn parse_timings(bytes: &[u8]) -> Result<Vec<u64>, RecordError> {
    let chunks = split_fixed_width(bytes, TIMING_RECORD_LEN)?;
    Ok(chunks
        .into_iter()
        .map(|chunk| {
            let mut record = [0u8; TIMING_RECORD_LEN];
            record.copy_from_slice(chunk);
            u64::from_ne_bytes(record)
        })
        .collect())
}

/// Split a stream of fixed-width records.
pub fn split_fixed_width(bytes: &[u8], width: usize) -> Result<Vec<&[u8]>, RecordError> {
    if width == 0 {
        return Err(RecordError::ZeroWidth);
    }
    if bytes.len() % width != 0 {
        return Err(RecordError::Misaligned {
            len: bytes.len(),
            record_len: width,
        });
    }
    Ok(bytes.chunks_exact(width).collect())
}

/// Split concatenated DER `SEQUENCE`s.
///
/// Only the outer header is checked; each returned slice includes it.
/// Short-form lengths and the one-byte long form (`0x81`) are accepted,
/// which covers every ECDSA signature up to 255 content bytes.
pub fn split_der_sequences(bytes: &[u8]) -> Result<Vec<&[u8]>, RecordError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let malformed = RecordError::MalformedDer { offset };
        let rest = &bytes[offset..];

        if rest[0] != DER_SEQUENCE {
            return Err(malformed);
        }
        let (header_len, content_len) = match rest.get(1) {
            Some(&len) if len < 0x80 => (2, usize::from(len)),
            Some(&0x81) => match rest.get(2) {
                Some(&len) if len >= 0x80 => (3, usize::from(len)),
                _ => return Err(malformed),
            },
            _ => return Err(malformed),
        };

        let total = header_len + content_len;
        if rest.len() < total {
            return Err(malformed);
        }
        records.push(&rest[..total]);
        offset += total;
    }

    Ok(records)
}
