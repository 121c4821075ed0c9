//! Streaming deserialization.
//!
//! [`Deserializer`] is a push-driven state machine. The caller hands it whatever bytes
//! are available with [`Deserializer::feed`]; it consumes every complete statement,
//! reports how many bytes it used and keeps the field whose value is still incomplete.
//! The caller re-presents the unconsumed tail together with the next chunk, and calls
//! [`Deserializer::finish`] once the source is exhausted.
//!
//! An open value keeps its scan position between calls, and comment bodies are
//! consumed as they arrive, so a long statement costs one pass however it is split.
//! A quoted value or array must be followed by the statement terminator, or by the end
//! of input.
//!
//! ## Usage
//!
//! Most users should use the high-level functions in the crate root:
//!
//! ```rust
//! use kvcfg::{from_str, key_value_record};
//!
//! key_value_record! {
//!     #[derive(Debug, Default, PartialEq)]
//!     pub struct Server {
//!         pub hostname: Option<String>,
//!         pub motd as "motd[]": Option<Vec<String>>,
//!     }
//! }
//!
//! let server: Server = from_str("hostname = \"Alpha\";\nmotd[] = {\"hi\", \"bye\"};\n").unwrap();
//! assert_eq!(server.hostname.as_deref(), Some("Alpha"));
//! assert_eq!(server.motd, Some(vec!["hi".to_string(), "bye".to_string()]));
//! ```
//!
//! ## Feeding chunks by hand
//!
//! ```rust
//! use kvcfg::{key_value_record, Deserializer};
//!
//! key_value_record! {
//!     #[derive(Debug, Default)]
//!     pub struct Limits {
//!         pub max_players as "maxPlayers": Option<u32>,
//!     }
//! }
//!
//! let mut de = Deserializer::<Limits>::for_record().unwrap();
//! let mut pending = b"maxPla".to_vec();
//! let used = de.feed(&pending).unwrap();
//! pending.drain(..used);
//!
//! pending.extend_from_slice(b"yers = 64;\n");
//! let used = de.feed(&pending).unwrap();
//! pending.drain(..used);
//!
//! let limits = de.finish(&pending).unwrap();
//! assert_eq!(limits.max_players, Some(64));
//! ```

use crate::codec::{parse_scalar, unescape};
use crate::grammar::GrammarConfig;
use crate::pool::StringPool;
use crate::schema::{schema_for, FieldDescriptor, Record, Schema};
use crate::value::{ScalarKind, Value};
use crate::{Error, Result};
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, trace};

/// Bytes requested from a reader per refill.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Outcome of one attempt to read a value.
enum Step {
    /// The value and the number of bytes it spanned, terminator included.
    Done(Value, usize),
    /// More input is required. Carries the leading blank bytes that may be dropped.
    NeedMore(usize),
}

/// Progress through a value that has not been closed yet.
///
/// Offsets are relative to the value's first byte, which the caller re-presents at the
/// start of the next buffer, so each byte of a long value is examined once.
#[derive(Clone, Copy, Debug, Default)]
struct Scan {
    /// Bytes already examined.
    at: usize,
    /// Inside a quoted element of an array.
    in_string: bool,
    separators: usize,
    has_content: bool,
}

/// Incremental reader for one record.
pub struct Deserializer<'g, R> {
    schema: Arc<Schema<R>>,
    grammar: &'g GrammarConfig,
    pool: &'g StringPool,
    record: R,
    /// Field whose key has been read but whose value has not.
    pending: Option<usize>,
    scan: Scan,
    /// Bytes of an unfinished key already searched for the separator.
    key_scan: usize,
    /// A comment start has been consumed but its end has not.
    in_comment: bool,
    consumed: u64,
    line: usize,
    fields_set: usize,
}

impl<R: Record> Deserializer<'static, R> {
    /// Creates a deserializer with the cached schema of `R` and the default grammar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] when `R` cannot be described.
    pub fn for_record() -> Result<Self> {
        Ok(Self::new(schema_for::<R>()?))
    }

    /// Creates a deserializer over `schema` with the default grammar.
    pub fn new(schema: Arc<Schema<R>>) -> Self {
        Deserializer {
            schema,
            grammar: GrammarConfig::shared(),
            pool: StringPool::shared(),
            record: R::default(),
            pending: None,
            scan: Scan::default(),
            key_scan: 0,
            in_comment: false,
            consumed: 0,
            line: 1,
            fields_set: 0,
        }
    }
}

impl<'g, R: Record> Deserializer<'g, R> {
    /// Creates a deserializer for a custom dialect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the grammar does not validate and
    /// [`Error::Schema`] when a wire name of `schema` clashes with its tokens.
    pub fn with_grammar(schema: Arc<Schema<R>>, grammar: &'g GrammarConfig) -> Result<Self> {
        grammar.validate()?;
        schema.check(grammar)?;
        Ok(Deserializer {
            grammar,
            ..Deserializer::new(schema)
        })
    }

    /// Interns strings into `pool` instead of the shared pool.
    #[must_use]
    pub fn with_pool(mut self, pool: &'g StringPool) -> Self {
        self.pool = pool;
        self
    }

    /// Consumes as many complete statements from `input` as possible.
    ///
    /// Returns the number of leading bytes of `input` that were used. The rest must be
    /// passed again, followed by new bytes, on the next call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] or [`Error::Format`]. The record is not usable
    /// after an error.
    pub fn feed(&mut self, input: &[u8]) -> Result<usize> {
        self.process(input, false)
    }

    /// Processes the final bytes of the input and returns the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] when the input stops in the middle of a statement,
    /// plus anything [`Deserializer::feed`] can return.
    pub fn finish(mut self, tail: &[u8]) -> Result<R> {
        self.process(tail, true)?;
        debug!(
            record = self.schema.record_name(),
            bytes = self.consumed,
            fields = self.fields_set,
            "deserialized record"
        );
        Ok(self.record)
    }

    /// Pulls the whole input from `reader` in chunks of `chunk_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when reading fails, plus anything [`Deserializer::finish`]
    /// can return.
    pub fn read_from<Rd: Read>(mut self, mut reader: Rd, chunk_size: usize) -> Result<R> {
        let mut chunk = vec![0u8; chunk_size.max(1)];
        let mut buffer: Vec<u8> = Vec::with_capacity(chunk.len());
        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            buffer.extend_from_slice(&chunk[..read]);
            let used = self.feed(&buffer)?;
            buffer.drain(..used);
        }
        self.finish(&buffer)
    }

    /// Total bytes consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Number of fields assigned so far.
    pub fn fields_set(&self) -> usize {
        self.fields_set
    }

    fn process(&mut self, buf: &[u8], eof: bool) -> Result<usize> {
        let grammar = self.grammar;
        let comment_start = grammar.comment_start.as_bytes();
        let comment_end = grammar.comment_end.as_bytes();
        let mut pos = 0;

        loop {
            if self.in_comment {
                let rest = &buf[pos..];
                match find(rest, comment_end) {
                    Some(at) => {
                        pos += at + comment_end.len();
                        self.in_comment = false;
                        continue;
                    }
                    None if eof => {
                        pos = buf.len();
                        self.in_comment = false;
                        break;
                    }
                    None => {
                        // keep what may be the first bytes of the comment end
                        let keep = comment_end.len().saturating_sub(1);
                        pos += rest.len().saturating_sub(keep);
                        trace!(offset = self.offset(pos), "comment spans buffer boundary");
                        break;
                    }
                }
            }

            let index = match self.pending {
                Some(index) => index,
                None => {
                    pos += buf[pos..]
                        .iter()
                        .take_while(|b| grammar.is_filler(**b))
                        .count();
                    let rest = &buf[pos..];
                    if rest.is_empty() {
                        break;
                    }

                    if rest.starts_with(comment_start) {
                        pos += comment_start.len();
                        self.in_comment = true;
                        continue;
                    }
                    if !eof && rest.len() < comment_start.len() && comment_start.starts_with(rest) {
                        break;
                    }

                    let separator = find_byte(rest, self.key_scan, grammar.key_value_separator);
                    let Some(separator) = separator else {
                        self.key_scan = rest.len();
                        if eof {
                            return Err(Error::truncated(
                                self.line_at(buf, pos),
                                self.offset(pos),
                                &format!("'{}' after key", grammar.key_value_separator as char),
                                rest,
                            ));
                        }
                        trace!(offset = self.offset(pos), "key spans buffer boundary");
                        break;
                    };

                    let key = trim(&rest[..separator], |b| grammar.is_filler(b));
                    let Some(index) = self.schema.position(key) else {
                        debug!(
                            record = self.schema.record_name(),
                            key = %String::from_utf8_lossy(key),
                            "unknown key"
                        );
                        return Err(Error::unknown_key(
                            key,
                            self.line_at(buf, pos),
                            self.offset(pos),
                        ));
                    };
                    pos += separator + 1;
                    self.key_scan = 0;
                    self.pending = Some(index);
                    index
                }
            };

            let field = &self.schema.fields()[index];
            let line = self.line_at(buf, pos);
            let step = read_value(field, &buf[pos..], grammar, self.pool, &mut self.scan, eof)
                .map_err(|e| e.located(field.wire_name(), Some(line)))?;

            match step {
                Step::Done(value, used) => {
                    field.set(&mut self.record, value)?;
                    trace!(field = field.name(), "field set");
                    pos += used;
                    self.pending = None;
                    self.scan = Scan::default();
                    self.fields_set += 1;
                }
                Step::NeedMore(blank) => {
                    pos += blank;
                    if eof {
                        return Err(Error::truncated(
                            self.line_at(buf, pos),
                            self.offset(pos),
                            &format!("the value of '{}'", field.name()),
                            &buf[pos..],
                        ));
                    }
                    trace!(
                        field = field.name(),
                        offset = self.offset(pos),
                        scanned = self.scan.at,
                        "value spans buffer boundary"
                    );
                    break;
                }
            }
        }

        self.line += count(&buf[..pos], b'\n');
        self.consumed += pos as u64;
        Ok(pos)
    }

    fn offset(&self, pos: usize) -> u64 {
        self.consumed + pos as u64
    }

    fn line_at(&self, buf: &[u8], pos: usize) -> usize {
        self.line + count(&buf[..pos], b'\n')
    }
}

/// Reads one value for `field` from the start of `rest`, resuming the scan recorded in
/// `scan` by an earlier call.
fn read_value<R>(
    field: &FieldDescriptor<R>,
    rest: &[u8],
    grammar: &GrammarConfig,
    pool: &StringPool,
    scan: &mut Scan,
    eof: bool,
) -> Result<Step> {
    let blank = rest.iter().take_while(|b| grammar.is_blank(**b)).count();
    let rest = &rest[blank..];
    let Some(&first) = rest.first() else {
        return Ok(Step::NeedMore(blank));
    };

    if first == grammar.array_start {
        if !field.is_array() {
            return Err(Error::format(
                field.kind(),
                excerpt(rest),
                "unexpected array for a single value",
            ));
        }
        let Some((end, count)) = array_end(rest, grammar, scan) else {
            return Ok(Step::NeedMore(blank));
        };
        let Some(used) = terminated(field.kind(), rest, end, grammar, eof)? else {
            scan.at = end;
            return Ok(Step::NeedMore(blank));
        };
        let items = parse_array(field, &rest[1..end], count, grammar, pool)?;
        return Ok(Step::Done(Value::Array(items), blank + used));
    }

    if field.is_array() {
        return Err(Error::format(
            field.kind(),
            excerpt(rest),
            format!("expected '{}' to open an array", grammar.array_start as char),
        ));
    }

    if first == grammar.string_delimiter {
        let Some(end) = closing_delimiter(rest, scan.at.max(1), grammar) else {
            scan.at = rest.len();
            return Ok(Step::NeedMore(blank));
        };
        let Some(used) = terminated(field.kind(), rest, end, grammar, eof)? else {
            scan.at = end;
            return Ok(Step::NeedMore(blank));
        };
        let content = unescape(&rest[1..end], grammar);
        let value = parse_scalar(field.kind(), &content, grammar, pool)?;
        return Ok(Step::Done(value, blank + used));
    }

    let Some(end) = find_byte(rest, scan.at, grammar.statement_terminator) else {
        scan.at = rest.len();
        return Ok(Step::NeedMore(blank));
    };
    let raw = trim(&rest[..end], |b| grammar.is_blank(b));
    let value = parse_scalar(field.kind(), raw, grammar, pool)?;
    Ok(Step::Done(value, blank + end + 1))
}

/// Checks that only blanks separate the value closed at `rest[end]` from the statement
/// terminator. Returns the bytes spanned through the terminator, or `None` when the
/// buffer ends first. End of input stands in for the terminator.
fn terminated(
    kind: ScalarKind,
    rest: &[u8],
    end: usize,
    grammar: &GrammarConfig,
    eof: bool,
) -> Result<Option<usize>> {
    let tail = &rest[end + 1..];
    let blank = tail.iter().take_while(|b| grammar.is_blank(**b)).count();
    match tail.get(blank) {
        Some(&b) if b == grammar.statement_terminator => Ok(Some(end + 1 + blank + 1)),
        Some(_) => Err(Error::format(
            kind,
            excerpt(&tail[blank..]),
            format!(
                "expected '{}' after the value",
                grammar.statement_terminator as char
            ),
        )),
        None if eof => Ok(Some(rest.len())),
        None => Ok(None),
    }
}

/// Index of the unescaped delimiter closing the string opened at `bytes[0]`.
fn string_end(bytes: &[u8], grammar: &GrammarConfig) -> Option<usize> {
    closing_delimiter(bytes, 1, grammar)
}

/// First unescaped string delimiter at or after `from`, which must be at least 1.
fn closing_delimiter(bytes: &[u8], from: usize, grammar: &GrammarConfig) -> Option<usize> {
    let mut from = from;
    loop {
        let at = find_byte(bytes, from, grammar.string_delimiter)?;
        if bytes[at - 1] != grammar.escape {
            return Some(at);
        }
        from = at + 1;
    }
}

/// Index of the array end matching the array start at `bytes[0]`, and the element
/// count. Separators and array ends inside quoted strings are skipped. When the array
/// is still open, `scan` records how far the bytes were examined.
fn array_end(bytes: &[u8], grammar: &GrammarConfig, scan: &mut Scan) -> Option<(usize, usize)> {
    let mut at = scan.at.max(1);
    while at < bytes.len() {
        if scan.in_string {
            match closing_delimiter(bytes, at, grammar) {
                Some(end) => {
                    scan.in_string = false;
                    at = end + 1;
                    continue;
                }
                None => {
                    at = bytes.len();
                    break;
                }
            }
        }

        let byte = bytes[at];
        if byte == grammar.string_delimiter {
            scan.in_string = true;
            scan.has_content = true;
        } else if byte == grammar.array_separator {
            scan.separators += 1;
        } else if byte == grammar.array_end {
            let count = if scan.separators == 0 && !scan.has_content {
                0
            } else {
                scan.separators + 1
            };
            scan.at = at;
            return Some((at, count));
        } else if !grammar.is_blank(byte) {
            scan.has_content = true;
        }
        at += 1;
    }
    scan.at = at;
    None
}

/// Splits the bytes between the array delimiters into elements and parses each one.
fn parse_array<R>(
    field: &FieldDescriptor<R>,
    body: &[u8],
    count: usize,
    grammar: &GrammarConfig,
    pool: &StringPool,
) -> Result<Vec<Value>> {
    let mut items = Vec::with_capacity(count);
    let mut at = 0;
    while items.len() < count {
        let rest = body.get(at..).unwrap_or_default();
        let blank = rest.iter().take_while(|b| grammar.is_blank(**b)).count();
        at += blank;
        let rest = &rest[blank..];

        let (value, used) = if rest.first() == Some(&grammar.string_delimiter) {
            // array_end already found every element's closing delimiter
            let end = string_end(rest, grammar)
                .ok_or_else(|| Error::format(field.kind(), excerpt(rest), "unterminated string"))?;
            let content = unescape(&rest[1..end], grammar);
            let value = parse_scalar(field.kind(), &content, grammar, pool)?;

            let trailing = rest[end + 1..]
                .iter()
                .take_while(|b| grammar.is_blank(**b))
                .count();
            let next = end + 1 + trailing;
            if next < rest.len() && rest[next] != grammar.array_separator {
                return Err(Error::format(
                    field.kind(),
                    excerpt(&rest[next..]),
                    "unexpected bytes after a quoted element",
                ));
            }
            (value, next)
        } else {
            let end = rest
                .iter()
                .position(|b| *b == grammar.array_separator)
                .unwrap_or(rest.len());
            let raw = trim(&rest[..end], |b| grammar.is_blank(b));
            (parse_scalar(field.kind(), raw, grammar, pool)?, end)
        };

        items.push(value);
        at += used + 1;
    }
    Ok(items)
}

fn trim(bytes: &[u8], skip: impl Fn(u8) -> bool) -> &[u8] {
    let start = bytes.iter().position(|b| !skip(*b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !skip(*b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    let tail = bytes.get(from..)?;
    tail.iter().position(|b| *b == byte).map(|at| from + at)
}

fn count(bytes: &[u8], byte: u8) -> usize {
    bytes.iter().filter(|b| **b == byte).count()
}

fn excerpt(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(32)]
}
