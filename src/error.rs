//! Error types for key-value serialization and deserialization.
//!
//! Every failure aborts the call that produced it. Nothing is retried inside the
//! codec and no partial record is ever handed back to the caller.
//!
//! ## Error Categories
//!
//! - **Schema errors**: a record type could not be described (duplicate or colliding
//!   wire names, wire names the grammar cannot express)
//! - **Unknown keys**: the input names a key that the record does not declare
//! - **Format errors**: a value's bytes do not parse as the field's scalar kind
//! - **Truncated input**: the input ended in the middle of a token
//! - **I/O errors**: the byte source or sink failed
//!
//! ## Examples
//!
//! ```rust
//! use kvcfg::{from_str, key_value_record, Error};
//!
//! key_value_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Settings {
//!         pub port: Option<u16>,
//!     }
//! }
//!
//! let result = from_str::<Settings>("port = 99999;");
//! assert!(matches!(result, Err(Error::Format { .. })));
//! ```

use crate::value::ScalarKind;
use std::fmt;
use std::io;
use thiserror::Error;

/// Where in the input a value was found.
///
/// Attached to [`Error::Format`] by the deserializer once the failing field is known.
/// Errors raised by the scalar codec on its own carry an empty location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub field: Option<String>,
    pub line: Option<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, " in field '{}'", field)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        Ok(())
    }
}

/// Represents all possible errors that can occur while reading or writing key-value data.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying byte source or sink failure, passed through unchanged.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The record type could not be turned into a schema.
    #[error("Schema error for '{record}': {msg}")]
    Schema { record: String, msg: String },

    /// A key in the input has no matching field.
    #[error("Unknown key '{key}' at line {line}, byte {offset}")]
    UnknownKey {
        key: String,
        line: usize,
        offset: u64,
    },

    /// A value does not parse as the scalar kind its field declares.
    #[error("Format error{location}: cannot read '{raw}' as {kind}: {msg}")]
    Format {
        kind: ScalarKind,
        raw: String,
        msg: String,
        location: Location,
    },

    /// Input ended in the middle of a token.
    #[error("Unexpected end of input at line {line}, byte {offset}: expected {expected}\n{context}")]
    Truncated {
        line: usize,
        offset: u64,
        expected: String,
        context: String,
    },

    /// A setter received a value whose kind does not match its field.
    #[error("Type mismatch for field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A grammar dialect is not usable.
    #[error("Invalid grammar: {0}")]
    Config(String),
}

impl Error {
    /// Creates a schema error for the named record type.
    pub fn schema(record: &str, msg: impl Into<String>) -> Self {
        Error::Schema {
            record: record.to_string(),
            msg: msg.into(),
        }
    }

    /// Creates an unknown-key error. The key bytes are decoded lossily.
    pub fn unknown_key(key: &[u8], line: usize, offset: u64) -> Self {
        Error::UnknownKey {
            key: String::from_utf8_lossy(key).into_owned(),
            line,
            offset,
        }
    }

    /// Creates a format error for `raw` bytes that failed to parse as `kind`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvcfg::{Error, ScalarKind};
    ///
    /// let err = Error::format(ScalarKind::U8, b"300", "number too large");
    /// assert!(err.to_string().contains("'300'"));
    /// assert!(err.to_string().contains("u8"));
    /// ```
    pub fn format(kind: ScalarKind, raw: &[u8], msg: impl fmt::Display) -> Self {
        Error::Format {
            kind,
            raw: String::from_utf8_lossy(raw).into_owned(),
            msg: msg.to_string(),
            location: Location::default(),
        }
    }

    /// Creates an end-of-input error with a short excerpt of the dangling bytes.
    pub fn truncated(line: usize, offset: u64, expected: &str, pending: &[u8]) -> Self {
        const EXCERPT: usize = 40;
        let excerpt = &pending[..pending.len().min(EXCERPT)];
        let mut context = String::from_utf8_lossy(excerpt).into_owned();
        if pending.len() > EXCERPT {
            context.push_str("...");
        }
        Error::Truncated {
            line,
            offset,
            expected: expected.to_string(),
            context,
        }
    }

    pub fn type_mismatch(field: &str, expected: &str, found: &str) -> Self {
        Error::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Fills in the field and line of a format error. Other variants pass through.
    pub(crate) fn located(self, field: &[u8], line: Option<usize>) -> Self {
        match self {
            Error::Format {
                kind, raw, msg, ..
            } => Error::Format {
                kind,
                raw,
                msg,
                location: Location {
                    field: Some(String::from_utf8_lossy(field).into_owned()),
                    line,
                },
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
