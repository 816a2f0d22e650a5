//! Tag/value private key files.
//!
//! ```text
//! # comment
//! curve=NIST P-256
//! d=<hex private scalar>
//! b=32
//! ```
//!
//! Blank lines and `#` lines are skipped. The three tags must appear in
//! this order; `b` is the field size in bytes and sets the output width of
//! each signature component.

use thiserror::Error;
use zeroize::Zeroizing;

use crate::signer::FIELD_SIZE;

/// Curve names accepted in the `curve` tag.
pub const SUPPORTED_CURVES: [&str; 4] = ["NIST P-256", "P-256", "prime256v1", "secp256r1"];

const TAGS: [&str; 3] = ["curve", "d", "b"];

/// Error from parsing a tag/value key file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyFileError {
    /// The file ended before `tag` was found.
    #[error("missing '{0}' line")]
    MissingTag(&'static str),

    /// A line has no `=` separator.
    #[error("line {line}: expected 'tag=value'")]
    MissingSeparator {
        /// 1-based line number.
        line: usize,
    },

    /// A tag other than the next expected one.
    #[error("line {line}: expected tag '{expected}', found '{found}'")]
    UnexpectedTag {
        /// 1-based line number.
        line: usize,
        /// Tag required at this point.
        expected: &'static str,
        /// Tag found instead.
        found: String,
    },

    /// Content after the `b` line.
    #[error("line {line}: unexpected content after 'b'")]
    TrailingContent {
        /// 1-based line number.
        line: usize,
    },

    /// Unknown curve name.
    #[error("unsupported curve '{0}'")]
    UnsupportedCurve(String),

    /// `d` is not valid hex or is empty.
    #[error("'d' is not a hex scalar")]
    InvalidScalar,

    /// `b` is not a decimal number.
    #[error("'b' is not a decimal byte count: '{0}'")]
    InvalidFieldSize(String),

    /// `b` does not match the curve.
    #[error("field size {found} does not match curve field size {expected}")]
    FieldSizeMismatch {
        /// Value of `b`.
        found: usize,
        /// Field size of the curve.
        expected: usize,
    },
}

/// Parsed contents of a tag/value key file.
#[derive(Debug)]
pub struct TagValueKey {
    /// Curve name as written in the file.
    pub curve: String,
    /// Big-endian private scalar.
    pub d: Zeroizing<Vec<u8>>,
    /// Field size in bytes.
    pub baseline: usize,
}

impl TagValueKey {
    /// Parse key file text.
    pub fn parse(text: &str) -> Result<Self, KeyFileError> {
        let mut values: Vec<&str> = Vec::with_capacity(TAGS.len());

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let expected = match TAGS.get(values.len()) {
                Some(tag) => *tag,
                None => return Err(KeyFileError::TrailingContent { line: line_no }),
            };

            let (tag, value) = line
                .split_once('=')
                .ok_or(KeyFileError::MissingSeparator { line: line_no })?;
            let tag = tag.trim();
            if tag != expected {
                return Err(KeyFileError::UnexpectedTag {
                    line: line_no,
                    expected,
                    found: tag.to_string(),
                });
            }
            values.push(value.trim());
        }

        if let Some(tag) = TAGS.get(values.len()) {
            return Err(KeyFileError::MissingTag(*tag));
        }

        let curve = values[0];
        if !SUPPORTED_CURVES.contains(&curve) {
            return Err(KeyFileError::UnsupportedCurve(curve.to_string()));
        }

        let d = Zeroizing::new(hex::decode(values[1]).map_err(|_| KeyFileError::InvalidScalar)?);
        if d.is_empty() {
            return Err(KeyFileError::InvalidScalar);
        }

        let baseline: usize = values[2]
            .parse()
            .map_err(|_| KeyFileError::InvalidFieldSize(values[2].to_string()))?;
        if baseline != FIELD_SIZE {
            return Err(KeyFileError::FieldSizeMismatch {
                found: baseline,
                expected: FIELD_SIZE,
            });
        }

        Ok(Self {
            curve: curve.to_string(),
            d,
            baseline,
        })
    }
}
