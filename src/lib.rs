//! # kvcfg
//!
//! A streaming codec for game-server style configuration files made of flat
//! `key = value;` statements.
//!
//! ```text
//! // Server identity
//! hostname = "Alpha | EU";
//! maxPlayers = 64;
//! motd[] = {"Welcome!", "Be nice."};
//! ```
//!
//! ## Key Features
//!
//! - **Streaming**: the [`Deserializer`] consumes input as it arrives, in chunks of any
//!   size, and resumes mid-statement on the next chunk
//! - **Typed fields**: 17 scalar kinds (strings, booleans, timestamps, durations, UUIDs,
//!   sized integers, floats and decimals) plus single-level arrays of each
//! - **Schema cache**: record layouts are built once per type and shared across threads
//! - **Configurable grammar**: every token is a [`GrammarConfig`] field, and dialects
//!   load from any serde format
//!
//! ## Quick Start
//!
//! ```rust
//! use kvcfg::{from_str, key_value_record, to_string};
//!
//! key_value_record! {
//!     #[derive(Debug, Default, PartialEq)]
//!     pub struct Server {
//!         pub hostname: Option<String>,
//!         pub max_players as "maxPlayers": Option<u32>,
//!         pub motd as "motd[]": Option<Vec<String>>,
//!         pub password: Option<String>,
//!     }
//! }
//!
//! let input = "// Server identity\n\
//!              hostname = \"Alpha | EU\";\n\
//!              maxPlayers = 64;\n\
//!              motd[] = {\"Welcome!\", \"Be nice.\"};\n";
//!
//! let server: Server = from_str(input).unwrap();
//! assert_eq!(server.max_players, Some(64));
//! assert_eq!(server.password, None);
//!
//! // Absent fields are omitted on write
//! let text = to_string(&server).unwrap();
//! assert_eq!(
//!     text,
//!     "hostname = \"Alpha | EU\";\nmaxPlayers = 64;\nmotd[] = {\"Welcome!\", \"Be nice.\"};\n"
//! );
//! assert_eq!(from_str::<Server>(&text).unwrap(), server);
//! ```
//!
//! ## Grammar
//!
//! - Statements are `key <separator> value <terminator>`; whitespace, newlines and
//!   stray terminators between statements are ignored
//! - Comments run from the comment start (`//`) to the comment end (a newline)
//! - Strings are delimited by `"`; an embedded `"` is written as `\"`
//! - Non-string values are written bare; quoted values are accepted for every kind
//! - Arrays are `{a, b, c}`; `{}` is an empty array
//! - Keys not declared by the record are an error
//!
//! ## Modules
//!
//! - [`de`] and [`ser`]: the streaming deserializer and the serializer
//! - [`schema`]: field descriptors, schemas and the schema cache
//! - [`codec`]: per-kind scalar parsing and formatting
//! - [`grammar`]: the token set and its validation
//! - [`value`]: scalar kinds, values and the Rust types that map onto them
//! - [`pool`]: string interning
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` when schemas are published or evicted and
//! when a record is read or written, `trace` for every field and every suspension at a
//! buffer boundary. No subscriber is installed.

pub mod codec;
pub mod de;
pub mod error;
pub mod grammar;
pub mod macros;
pub mod pool;
pub mod schema;
pub mod ser;
pub mod value;

pub use de::{Deserializer, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Location, Result};
pub use grammar::{GrammarConfig, TemporalFormat};
pub use pool::StringPool;
pub use schema::{
    clear_schemas, evict, schema_for, FieldDescriptor, Getter, Record, Schema, SchemaBuilder,
    Setter,
};
pub use ser::Serializer;
pub use value::{FieldType, ScalarKind, Value};

use std::io;

/// Serialize a record to a writer.
///
/// # Examples
///
/// ```rust
/// use kvcfg::{key_value_record, to_writer};
///
/// key_value_record! {
///     #[derive(Default)]
///     pub struct Vote {
///         pub vote_threshold as "voteThreshold": Option<f32>,
///     }
/// }
///
/// let mut buffer = Vec::new();
/// to_writer(&mut buffer, &Vote { vote_threshold: Some(0.33) }).unwrap();
/// assert_eq!(buffer, b"voteThreshold = 0.33;\n");
/// ```
///
/// # Errors
///
/// Returns an error if the record's schema cannot be built, a value cannot be expressed
/// in the grammar, or writing to the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W, R>(writer: W, record: &R) -> Result<()>
where
    W: io::Write,
    R: Record,
{
    let mut serializer = Serializer::new(writer);
    serializer.serialize(record)?;
    serializer.flush()
}

/// Serialize a record to a writer using a custom grammar.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid grammar, plus anything [`to_writer`] can
/// return.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer_with_grammar<W, R>(writer: W, record: &R, grammar: &GrammarConfig) -> Result<()>
where
    W: io::Write,
    R: Record,
{
    let mut serializer = Serializer::with_grammar(writer, grammar)?;
    serializer.serialize(record)?;
    serializer.flush()
}

/// Serialize a record to a byte vector.
///
/// # Errors
///
/// See [`to_writer`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_vec<R: Record>(record: &R) -> Result<Vec<u8>> {
    let mut serializer = Serializer::new(Vec::with_capacity(256));
    serializer.serialize(record)?;
    Ok(serializer.into_inner())
}

/// Serialize a record to a string.
///
/// # Errors
///
/// See [`to_writer`]. The output is always valid UTF-8 since every written value is.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string<R: Record>(record: &R) -> Result<String> {
    let bytes = to_vec(record)?;
    String::from_utf8(bytes).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Deserialize a record from a complete byte slice.
///
/// # Examples
///
/// ```rust
/// use kvcfg::{from_slice, key_value_record};
///
/// key_value_record! {
///     #[derive(Debug, Default)]
///     pub struct Flags {
///         pub persistent: Option<bool>,
///         pub ports as "ports[]": Option<Vec<u16>>,
///     }
/// }
///
/// let flags: Flags = from_slice(b"persistent = true;\r\nports[] = {2302,2303};\r\n").unwrap();
/// assert_eq!(flags.persistent, Some(true));
/// assert_eq!(flags.ports, Some(vec![2302, 2303]));
/// ```
///
/// # Errors
///
/// Returns an error for unknown keys, values that do not parse as their field's kind,
/// or input that ends in the middle of a statement.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<R: Record>(input: &[u8]) -> Result<R> {
    let mut deserializer = Deserializer::<R>::for_record()?;
    let used = deserializer.feed(input)?;
    deserializer.finish(&input[used..])
}

/// Deserialize a record from a string.
///
/// # Errors
///
/// See [`from_slice`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str<R: Record>(input: &str) -> Result<R> {
    from_slice(input.as_bytes())
}

/// Deserialize a record from an I/O stream, reading [`DEFAULT_CHUNK_SIZE`] bytes at a
/// time.
///
/// # Examples
///
/// ```rust
/// use kvcfg::{from_reader, key_value_record};
/// use std::io::Cursor;
///
/// key_value_record! {
///     #[derive(Debug, Default)]
///     pub struct Limits {
///         pub max_players as "maxPlayers": Option<u32>,
///     }
/// }
///
/// let limits: Limits = from_reader(Cursor::new(b"maxPlayers = 32;")).unwrap();
/// assert_eq!(limits.max_players, Some(32));
/// ```
///
/// # Errors
///
/// Returns [`Error::Io`] if reading fails, plus anything [`from_slice`] can return.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<Rd, R>(reader: Rd) -> Result<R>
where
    Rd: io::Read,
    R: Record,
{
    Deserializer::<R>::for_record()?.read_from(reader, DEFAULT_CHUNK_SIZE)
}

/// Deserialize a record from an I/O stream using a custom grammar and chunk size.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid grammar, plus anything [`from_reader`] can
/// return.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader_with_grammar<Rd, R>(
    reader: Rd,
    grammar: &GrammarConfig,
    chunk_size: usize,
) -> Result<R>
where
    Rd: io::Read,
    R: Record,
{
    Deserializer::with_grammar(schema_for::<R>()?, grammar)?.read_from(reader, chunk_size)
}
