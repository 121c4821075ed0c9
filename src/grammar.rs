//! Byte-level grammar of the key-value format.
//!
//! The grammar is data, not code: every token the deserializer looks for and the
//! serializer writes comes from a [`GrammarConfig`]. The default dialect is the one
//! used by game-server configuration files:
//!
//! ```text
//! // comment until end of line
//! hostname = "My Server";
//! maxPlayers = 32;
//! motd[] = {"Welcome", "Have fun"};
//! ```
//!
//! - [`GrammarConfig`]: the token set plus the temporal format tag
//! - [`TemporalFormat`]: how datetimes are written and read
//!
//! ## Examples
//!
//! ```rust
//! use kvcfg::{GrammarConfig, TemporalFormat};
//!
//! // A dialect with `#` comments and square-bracket arrays
//! let grammar = GrammarConfig::new()
//!     .with_comment("#", "\n")
//!     .with_array_tokens(b'[', b',', b']')
//!     .with_temporal_format(TemporalFormat::Rfc1123);
//!
//! assert!(grammar.validate().is_ok());
//! ```

use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static SHARED: Lazy<GrammarConfig> = Lazy::new(GrammarConfig::default);

/// Format tag for the datetime kinds.
///
/// Durations are not affected by the tag: they are always written as
/// `[-][d.]hh:mm:ss[.fffffffff]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalFormat {
    /// ISO-8601 / RFC 3339, e.g. `2023-01-03T00:00:00+00:00`. Round-trips exactly.
    #[default]
    RoundTrip,
    /// RFC 1123, e.g. `Tue, 03 Jan 2023 00:00:00 GMT`. Whole seconds, always UTC.
    Rfc1123,
}

/// The tokens of one key-value dialect.
///
/// Single-byte tokens must be ASCII. Multi-byte tokens (comment delimiters, whitespace
/// set, newline) are stored as strings and matched as raw UTF-8 bytes.
///
/// The struct can be loaded from any serde format; missing entries fall back to the
/// defaults and single-byte tokens are written as one-character strings:
///
/// ```rust
/// use kvcfg::GrammarConfig;
///
/// let grammar: GrammarConfig = serde_json::from_str(r#"{ "statement_terminator": "!" }"#).unwrap();
/// assert_eq!(grammar.statement_terminator, b'!');
/// assert_eq!(grammar.key_value_separator, b'=');
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub comment_start: String,
    pub comment_end: String,
    #[serde(with = "byte_token")]
    pub array_start: u8,
    #[serde(with = "byte_token")]
    pub array_end: u8,
    #[serde(with = "byte_token")]
    pub array_separator: u8,
    #[serde(with = "byte_token")]
    pub string_delimiter: u8,
    #[serde(with = "byte_token")]
    pub escape: u8,
    #[serde(with = "byte_token")]
    pub key_value_separator: u8,
    #[serde(with = "byte_token")]
    pub statement_terminator: u8,
    /// Written around the key-value separator and after array separators.
    #[serde(with = "byte_token")]
    pub space: u8,
    /// Bytes skipped around keys and values. Not including the newline.
    pub whitespace: String,
    /// Written after every statement.
    pub new_line: String,
    pub temporal_format: TemporalFormat,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            comment_start: "//".to_string(),
            comment_end: "\n".to_string(),
            array_start: b'{',
            array_end: b'}',
            array_separator: b',',
            string_delimiter: b'"',
            escape: b'\\',
            key_value_separator: b'=',
            statement_terminator: b';',
            space: b' ',
            whitespace: " \t\r".to_string(),
            new_line: "\n".to_string(),
            temporal_format: TemporalFormat::RoundTrip,
        }
    }
}

impl GrammarConfig {
    /// Creates the default dialect.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default dialect.
    pub fn shared() -> &'static GrammarConfig {
        &SHARED
    }

    /// Sets the comment delimiters. A comment runs from `start` to the next `end`.
    #[must_use]
    pub fn with_comment(mut self, start: &str, end: &str) -> Self {
        self.comment_start = start.to_string();
        self.comment_end = end.to_string();
        self
    }

    /// Sets the array open, element separator and close bytes.
    #[must_use]
    pub fn with_array_tokens(mut self, start: u8, separator: u8, end: u8) -> Self {
        self.array_start = start;
        self.array_separator = separator;
        self.array_end = end;
        self
    }

    /// Sets the string delimiter and the byte that escapes it inside strings.
    #[must_use]
    pub fn with_string_tokens(mut self, delimiter: u8, escape: u8) -> Self {
        self.string_delimiter = delimiter;
        self.escape = escape;
        self
    }

    #[must_use]
    pub fn with_key_value_separator(mut self, separator: u8) -> Self {
        self.key_value_separator = separator;
        self
    }

    #[must_use]
    pub fn with_statement_terminator(mut self, terminator: u8) -> Self {
        self.statement_terminator = terminator;
        self
    }

    #[must_use]
    pub fn with_whitespace(mut self, whitespace: &str) -> Self {
        self.whitespace = whitespace.to_string();
        self
    }

    /// Sets the newline written after each statement, e.g. `"\r\n"`.
    #[must_use]
    pub fn with_new_line(mut self, new_line: &str) -> Self {
        self.new_line = new_line.to_string();
        self
    }

    #[must_use]
    pub fn with_temporal_format(mut self, format: TemporalFormat) -> Self {
        self.temporal_format = format;
        self
    }

    /// Checks that the dialect can be tokenized unambiguously.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a token is empty or non-ASCII, when two structural
    /// tokens share a byte, when a structural token is also whitespace, or when the
    /// comment start would be skipped as filler.
    pub fn validate(&self) -> Result<()> {
        if self.comment_start.is_empty() || self.comment_end.is_empty() {
            return Err(Error::config("comment delimiters must not be empty"));
        }
        if self.new_line.is_empty() {
            return Err(Error::config("new line must not be empty"));
        }
        if self.comment_start.bytes().next().is_some_and(|b| self.is_filler(b)) {
            return Err(Error::config(
                "comment start must not begin with whitespace or the statement terminator",
            ));
        }

        let structural = [
            ("array start", self.array_start),
            ("array end", self.array_end),
            ("array separator", self.array_separator),
            ("string delimiter", self.string_delimiter),
            ("key-value separator", self.key_value_separator),
            ("statement terminator", self.statement_terminator),
        ];

        for (i, (name, byte)) in structural.iter().enumerate() {
            if !byte.is_ascii() {
                return Err(Error::config(format!("{} must be an ASCII byte", name)));
            }
            if self.is_whitespace(*byte) || self.new_line.as_bytes().contains(byte) {
                return Err(Error::config(format!("{} must not be whitespace", name)));
            }
            if let Some((other, _)) = structural[i + 1..].iter().find(|(_, b)| b == byte) {
                return Err(Error::config(format!(
                    "{} and {} share the byte {:?}",
                    name, other, *byte as char
                )));
            }
        }

        if !self.escape.is_ascii() || !self.space.is_ascii() {
            return Err(Error::config("escape and space must be ASCII bytes"));
        }
        if self.escape == self.string_delimiter {
            return Err(Error::config("escape must differ from the string delimiter"));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn is_whitespace(&self, byte: u8) -> bool {
        self.whitespace.as_bytes().contains(&byte)
    }

    /// Whitespace, newlines and statement terminators: everything skipped between
    /// statements. Comment delimiters are matched as whole tokens, never as filler.
    #[inline]
    pub(crate) fn is_filler(&self, byte: u8) -> bool {
        byte == self.statement_terminator || self.is_blank(byte)
    }

    /// Whitespace and newlines, without the statement terminator.
    #[inline]
    pub(crate) fn is_blank(&self, byte: u8) -> bool {
        self.is_whitespace(byte) || self.new_line.as_bytes().contains(&byte)
    }

    /// `" = "` in the default dialect.
    pub(crate) fn key_value_separator_bytes(&self) -> [u8; 3] {
        [self.space, self.key_value_separator, self.space]
    }

    /// `", "` in the default dialect.
    pub(crate) fn array_separator_bytes(&self) -> [u8; 2] {
        [self.array_separator, self.space]
    }
}

/// Serde adapter storing a single ASCII byte as a one-character string.
mod byte_token {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(byte: &u8, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut buf = [0u8; 4];
        serializer.serialize_str((*byte as char).encode_utf8(&mut buf))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(D::Error::custom(format!(
                "expected a single ASCII character, found {:?}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GrammarConfig::default().validate().is_ok());
        assert_eq!(GrammarConfig::shared(), &GrammarConfig::default());
    }

    #[test]
    fn test_filler_set() {
        let grammar = GrammarConfig::default();
        for b in [b' ', b'\t', b'\r', b'\n', b';'] {
            assert!(grammar.is_filler(b), "{:?} should be filler", b as char);
        }
        for b in [b'=', b'{', b'"', b'a', b'/'] {
            assert!(!grammar.is_filler(b), "{:?} should not be filler", b as char);
        }
        assert!(!grammar.is_blank(b';'));
    }

    #[test]
    fn test_block_comment_bytes_are_not_filler() {
        let grammar = GrammarConfig::new().with_comment("/*", "*/");
        assert!(grammar.validate().is_ok());
        for b in [b'/', b'*'] {
            assert!(!grammar.is_filler(b), "{:?} should not be filler", b as char);
            assert!(!grammar.is_blank(b));
        }
    }

    #[test]
    fn test_rejects_comment_start_made_of_filler() {
        for start in [";;", " #", "\n--"] {
            let grammar = GrammarConfig::new().with_comment(start, "\n");
            assert!(
                matches!(grammar.validate(), Err(Error::Config(_))),
                "{start:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_written_separators() {
        let grammar = GrammarConfig::default();
        assert_eq!(&grammar.key_value_separator_bytes(), b" = ");
        assert_eq!(&grammar.array_separator_bytes(), b", ");
    }

    #[test]
    fn test_rejects_shared_structural_byte() {
        let grammar = GrammarConfig::new().with_statement_terminator(b',');
        let err = grammar.validate().unwrap_err();
        assert!(err.to_string().contains("array separator"));
    }

    #[test]
    fn test_rejects_whitespace_token() {
        let grammar = GrammarConfig::new().with_key_value_separator(b' ');
        assert!(matches!(grammar.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_escape_equal_to_delimiter() {
        let grammar = GrammarConfig::new().with_string_tokens(b'\'', b'\'');
        assert!(grammar.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_comment() {
        let grammar = GrammarConfig::new().with_comment("", "\n");
        assert!(grammar.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let grammar = GrammarConfig::new()
            .with_array_tokens(b'[', b'|', b']')
            .with_temporal_format(TemporalFormat::Rfc1123);
        let json = serde_json::to_string(&grammar).unwrap();
        assert!(json.contains(r#""array_start":"[""#));
        assert!(json.contains(r#""temporal_format":"rfc1123""#));
        let back: GrammarConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grammar);
    }

    #[test]
    fn test_serde_rejects_multi_char_token() {
        let result: std::result::Result<GrammarConfig, _> =
            serde_json::from_str(r#"{ "array_start": "{{" }"#);
        assert!(result.is_err());
    }
}
