//! Record serialization.
//!
//! The [`Serializer`] walks a record's schema in declaration order and writes one
//! `name = value;` statement per present field. Absent fields are omitted, so a record
//! written and read back yields the same set of present fields.
//!
//! ## Usage
//!
//! Most users should use the high-level functions in the crate root:
//!
//! ```rust
//! use kvcfg::{key_value_record, to_string};
//!
//! key_value_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Server {
//!         pub hostname: Option<String>,
//!         pub password: Option<String>,
//!         pub admins as "admins[]": Option<Vec<u64>>,
//!     }
//! }
//!
//! let server = Server {
//!     hostname: Some("Alpha \"EU\"".into()),
//!     password: None,
//!     admins: Some(vec![7656119, 7656120]),
//! };
//!
//! let text = to_string(&server).unwrap();
//! assert_eq!(text, "hostname = \"Alpha \\\"EU\\\"\";\nadmins[] = {7656119, 7656120};\n");
//! ```
//!
//! ## Direct Serializer Usage
//!
//! ```rust
//! use kvcfg::{key_value_record, GrammarConfig, Serializer};
//!
//! key_value_record! {
//!     #[derive(Default)]
//!     pub struct Limits {
//!         pub max_players as "maxPlayers": Option<u32>,
//!     }
//! }
//!
//! let grammar = GrammarConfig::new().with_key_value_separator(b':');
//! let mut serializer = Serializer::with_grammar(Vec::new(), &grammar).unwrap();
//! serializer.serialize(&Limits { max_players: Some(32) }).unwrap();
//! assert_eq!(serializer.into_inner(), b"maxPlayers : 32;\n");
//! ```

use crate::codec::format_value;
use crate::grammar::GrammarConfig;
use crate::schema::{schema_for, Record, Schema};
use crate::Result;
use std::io::Write;
use tracing::{debug, trace};

/// Writes records to a byte sink.
///
/// Each statement is assembled in a scratch buffer and handed to the writer whole.
pub struct Serializer<'g, W> {
    writer: W,
    grammar: &'g GrammarConfig,
    scratch: Vec<u8>,
}

impl<W: Write> Serializer<'static, W> {
    /// Creates a serializer with the default grammar.
    pub fn new(writer: W) -> Self {
        Serializer {
            writer,
            grammar: GrammarConfig::shared(),
            scratch: Vec::with_capacity(256),
        }
    }
}

impl<'g, W: Write> Serializer<'g, W> {
    /// Creates a serializer for a custom dialect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when the grammar does not validate.
    pub fn with_grammar(writer: W, grammar: &'g GrammarConfig) -> Result<Self> {
        grammar.validate()?;
        Ok(Serializer {
            writer,
            grammar,
            scratch: Vec::with_capacity(256),
        })
    }

    /// Writes every present field of `record`, using the cached schema of `R`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`](crate::Error::Schema) when `R` cannot be described,
    /// plus anything [`Serializer::serialize_with`] can return.
    pub fn serialize<R: Record>(&mut self, record: &R) -> Result<()> {
        let schema = schema_for::<R>()?;
        self.serialize_with(&schema, record)
    }

    /// Writes every present field of `record` in the order of `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`](crate::Error::Schema) before anything is written when a
    /// wire name clashes with the grammar's tokens, [`Error::Io`](crate::Error::Io) when
    /// the writer fails and [`Error::Format`](crate::Error::Format) for a string value
    /// that cannot be expressed in the grammar.
    pub fn serialize_with<R>(&mut self, schema: &Schema<R>, record: &R) -> Result<()> {
        schema.check(self.grammar)?;

        let mut written = 0;
        let mut skipped = 0;
        let mut bytes = 0;

        for field in schema.fields() {
            let Some(value) = field.get(record) else {
                trace!(field = field.name(), "field absent, skipped");
                skipped += 1;
                continue;
            };

            self.scratch.clear();
            self.scratch.extend_from_slice(field.wire_name());
            self.scratch
                .extend_from_slice(&self.grammar.key_value_separator_bytes());
            format_value(&value, self.grammar, &mut self.scratch)
                .map_err(|e| e.located(field.wire_name(), None))?;
            self.scratch.push(self.grammar.statement_terminator);
            self.scratch.extend_from_slice(self.grammar.new_line.as_bytes());

            self.writer.write_all(&self.scratch)?;
            written += 1;
            bytes += self.scratch.len();
        }

        debug!(
            record = schema.record_name(),
            fields = written,
            skipped,
            bytes,
            "serialized record"
        );
        Ok(())
    }

    /// Flushes the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
