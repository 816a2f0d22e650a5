//! Canonical S-expressions.
//!
//! One backend answers a signing call with a structured response of the form
//!
//! ```text
//! (sig-val (ecdsa (r <mpi>) (s <mpi>)))
//! ```
//!
//! serialized in canonical form: lists are `(` ... `)`, atoms are
//! `<decimal length>:<bytes>`, with no whitespace. The signer locates the
//! named components with [`Sexp::find_token`] and [`Sexp::nth_data`].

use thiserror::Error;

/// Maximum list nesting accepted by the parser.
pub const MAX_DEPTH: usize = 32;

/// A parsed S-expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    /// Raw byte string.
    Atom(Vec<u8>),
    /// Ordered list of nodes.
    List(Vec<Sexp>),
}

/// Error from parsing a canonical S-expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SexpError {
    /// Input ended inside an expression.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    /// Atom length prefix is missing, malformed or overflows.
    #[error("invalid atom length at offset {0}")]
    InvalidLength(usize),

    /// A byte that cannot start or continue an expression.
    #[error("unexpected byte 0x{byte:02x} at offset {offset}")]
    UnexpectedByte {
        /// The offending byte.
        byte: u8,
        /// Its offset in the input.
        offset: usize,
    },

    /// Bytes left over after one complete expression.
    #[error("{0} trailing bytes after expression")]
    TrailingData(usize),

    /// Lists nested deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

impl Sexp {
    /// Build an atom.
    pub fn atom(data: impl Into<Vec<u8>>) -> Self {
        Sexp::Atom(data.into())
    }

    /// Build a list.
    pub fn list(items: Vec<Sexp>) -> Self {
        Sexp::List(items)
    }

    /// Bytes of an atom, `None` for lists.
    pub fn as_atom(&self) -> Option<&[u8]> {
        match self {
            Sexp::Atom(data) => Some(data),
            Sexp::List(_) => None,
        }
    }

    /// Children of a list; empty for atoms.
    pub fn items(&self) -> &[Sexp] {
        match self {
            Sexp::Atom(_) => &[],
            Sexp::List(items) => items,
        }
    }

    /// Find the first list, depth first, whose leading atom equals `token`.
    ///
    /// `self` is checked before its children, so `find_token` on a matching
    /// list returns that list.
    pub fn find_token(&self, token: &str) -> Option<&Sexp> {
        let items = match self {
            Sexp::Atom(_) => return None,
            Sexp::List(items) => items,
        };

        if items.first().and_then(Sexp::as_atom) == Some(token.as_bytes()) {
            return Some(self);
        }

        items
            .iter()
            .filter(|item| matches!(item, Sexp::List(_)))
            .find_map(|item| item.find_token(token))
    }

    /// Bytes of the `n`th element of a list when that element is an atom.
    pub fn nth_data(&self, n: usize) -> Option<&[u8]> {
        self.items().get(n).and_then(Sexp::as_atom)
    }

    /// Append the canonical encoding of `self` to `out`.
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Sexp::Atom(data) => {
                out.extend_from_slice(data.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(data);
            }
            Sexp::List(items) => {
                out.push(b'(');
                for item in items {
                    item.write_canonical(out);
                }
                out.push(b')');
            }
        }
    }

    /// Canonical encoding of `self`.
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_canonical(&mut out);
        out
    }

    /// Parse exactly one canonical expression.
    pub fn parse_canonical(input: &[u8]) -> Result<Sexp, SexpError> {
        let (sexp, end) = parse_at(input, 0, 0)?;
        if end != input.len() {
            return Err(SexpError::TrailingData(input.len() - end));
        }
        Ok(sexp)
    }
}

fn parse_at(input: &[u8], pos: usize, depth: usize) -> Result<(Sexp, usize), SexpError> {
    let byte = *input.get(pos).ok_or(SexpError::UnexpectedEnd(pos))?;
    match byte {
        b'(' => {
            if depth >= MAX_DEPTH {
                return Err(SexpError::TooDeep);
            }
            let mut items = Vec::new();
            let mut cursor = pos + 1;
            loop {
                match input.get(cursor) {
                    None => return Err(SexpError::UnexpectedEnd(cursor)),
                    Some(b')') => return Ok((Sexp::List(items), cursor + 1)),
                    Some(_) => {
                        let (item, next) = parse_at(input, cursor, depth + 1)?;
                        items.push(item);
                        cursor = next;
                    }
                }
            }
        }
        b'0'..=b'9' => parse_atom(input, pos),
        _ => Err(SexpError::UnexpectedByte { byte, offset: pos }),
    }
}

fn parse_atom(input: &[u8], pos: usize) -> Result<(Sexp, usize), SexpError> {
    let mut len: usize = 0;
    let mut cursor = pos;

    loop {
        match input.get(cursor) {
            None => return Err(SexpError::UnexpectedEnd(cursor)),
            Some(b':') => break,
            Some(&digit @ b'0'..=b'9') => {
                len = len
                    .checked_mul(10)
                    .and_then(|l| l.checked_add(usize::from(digit - b'0')))
                    .ok_or(SexpError::InvalidLength(pos))?;
            }
            Some(_) => return Err(SexpError::InvalidLength(pos)),
        }
        cursor += 1;
    }

    let start = cursor + 1;
    let end = start
        .checked_add(len)
        .ok_or(SexpError::InvalidLength(pos))?;
    if end > input.len() {
        return Err(SexpError::UnexpectedEnd(input.len()));
    }

    Ok((Sexp::Atom(input[start..end].to_vec()), end))
}
