//! Per-kind scalar parsing and formatting.
//!
//! [`parse_scalar`] turns the raw bytes of one value (already unquoted and unescaped)
//! into a [`Value`] of the requested [`ScalarKind`]. [`format_value`] writes a value
//! back in the grammar's notation and reports how many bytes it appended.
//!
//! Numbers are parsed straight from the input bytes; only strings allocate, and they
//! are interned through a [`StringPool`].
//!
//! ```rust
//! use kvcfg::codec::{format_value, parse_scalar};
//! use kvcfg::{GrammarConfig, ScalarKind, StringPool, Value};
//!
//! let grammar = GrammarConfig::default();
//! let pool = StringPool::default();
//!
//! let value = parse_scalar(ScalarKind::Duration, b"1.02:03:04.5", &grammar, &pool).unwrap();
//!
//! let mut out = Vec::new();
//! let written = format_value(&value, &grammar, &mut out).unwrap();
//! assert_eq!(out, b"1.02:03:04.5");
//! assert_eq!(written, out.len());
//! ```

use crate::grammar::{GrammarConfig, TemporalFormat};
use crate::pool::StringPool;
use crate::value::{ScalarKind, Value};
use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;
use uuid::Uuid;

const ROUND_TRIP_NAIVE: &str = "%Y-%m-%dT%H:%M:%S%.f";
const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";
const UUID_LEN: usize = 36;
const SECONDS_PER_DAY: i64 = 86_400;

/// Parses the bytes of a single scalar as `kind`.
///
/// # Errors
///
/// Returns [`Error::Format`] naming the kind and the offending bytes.
pub fn parse_scalar(
    kind: ScalarKind,
    raw: &[u8],
    grammar: &GrammarConfig,
    pool: &StringPool,
) -> Result<Value> {
    let value = match kind {
        ScalarKind::String => Value::String(pool.intern(text(kind, raw)?)),
        ScalarKind::Bool => match raw {
            b"true" => Value::Bool(true),
            b"false" => Value::Bool(false),
            _ => return Err(Error::format(kind, raw, "expected `true` or `false`")),
        },
        ScalarKind::DateTime => Value::DateTime(parse_datetime(raw, grammar.temporal_format)?),
        ScalarKind::DateTimeOffset => {
            Value::DateTimeOffset(parse_datetime_offset(raw, grammar.temporal_format)?)
        }
        ScalarKind::Duration => Value::Duration(parse_duration(raw)?),
        ScalarKind::Uuid => {
            if raw.len() != UUID_LEN {
                return Err(Error::format(kind, raw, "expected the 36-character hyphenated form"));
            }
            Value::Uuid(Uuid::try_parse_ascii(raw).map_err(|e| Error::format(kind, raw, e))?)
        }
        ScalarKind::I8 => Value::I8(parse_number(kind, raw)?),
        ScalarKind::U8 => Value::U8(parse_number(kind, raw)?),
        ScalarKind::I16 => Value::I16(parse_number(kind, raw)?),
        ScalarKind::U16 => Value::U16(parse_number(kind, raw)?),
        ScalarKind::I32 => Value::I32(parse_number(kind, raw)?),
        ScalarKind::U32 => Value::U32(parse_number(kind, raw)?),
        ScalarKind::I64 => Value::I64(parse_number(kind, raw)?),
        ScalarKind::U64 => Value::U64(parse_number(kind, raw)?),
        ScalarKind::F32 => Value::F32(parse_number(kind, raw)?),
        ScalarKind::F64 => Value::F64(parse_number(kind, raw)?),
        ScalarKind::Decimal => Value::Decimal(parse_decimal(raw)?),
    };
    Ok(value)
}

/// Appends `value` to `out` and returns the number of bytes written.
///
/// Strings are wrapped in the string delimiter with embedded delimiters escaped.
/// Arrays are wrapped in the array delimiters with `", "` between elements.
///
/// # Errors
///
/// Returns [`Error::Format`] for a string ending in the escape byte (it would escape
/// its own closing delimiter) and [`Error::TypeMismatch`] for a nested array.
pub fn format_value(value: &Value, grammar: &GrammarConfig, out: &mut Vec<u8>) -> Result<usize> {
    let start = out.len();
    match value {
        Value::Array(items) => {
            out.push(grammar.array_start);
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.extend_from_slice(&grammar.array_separator_bytes());
                }
                if item.is_array() {
                    return Err(Error::type_mismatch("array element", "scalar", "array"));
                }
                format_value(item, grammar, out)?;
            }
            out.push(grammar.array_end);
        }
        Value::String(s) => write_string(s.as_bytes(), grammar, out)?,
        Value::Bool(v) => out.extend_from_slice(if *v { b"true" } else { b"false" }),
        Value::DateTime(v) => match grammar.temporal_format {
            TemporalFormat::RoundTrip => write!(out, "{}", v.format(ROUND_TRIP_NAIVE))?,
            TemporalFormat::Rfc1123 => write!(out, "{}", v.format(RFC1123))?,
        },
        Value::DateTimeOffset(v) => match grammar.temporal_format {
            TemporalFormat::RoundTrip => {
                out.extend_from_slice(v.to_rfc3339_opts(SecondsFormat::AutoSi, false).as_bytes())
            }
            TemporalFormat::Rfc1123 => {
                write!(out, "{}", v.with_timezone(&Utc).format(RFC1123))?
            }
        },
        Value::Duration(v) => write_duration(*v, out)?,
        Value::Uuid(v) => write!(out, "{}", v.hyphenated())?,
        Value::I8(v) => write!(out, "{}", v)?,
        Value::U8(v) => write!(out, "{}", v)?,
        Value::I16(v) => write!(out, "{}", v)?,
        Value::U16(v) => write!(out, "{}", v)?,
        Value::I32(v) => write!(out, "{}", v)?,
        Value::U32(v) => write!(out, "{}", v)?,
        Value::I64(v) => write!(out, "{}", v)?,
        Value::U64(v) => write!(out, "{}", v)?,
        Value::F32(v) => write!(out, "{}", v)?,
        Value::F64(v) => write!(out, "{}", v)?,
        Value::Decimal(v) => write!(out, "{}", v)?,
    }
    Ok(out.len() - start)
}

/// Removes the escape byte in front of every string delimiter.
///
/// The input is the content between an opening delimiter and the first unescaped
/// closing one, so every delimiter inside it is escaped.
pub fn unescape<'a>(raw: &'a [u8], grammar: &GrammarConfig) -> Cow<'a, [u8]> {
    if !raw.contains(&grammar.string_delimiter) {
        return Cow::Borrowed(raw);
    }
    let mut unescaped = Vec::with_capacity(raw.len());
    for &byte in raw {
        if byte == grammar.string_delimiter && unescaped.last() == Some(&grammar.escape) {
            unescaped.pop();
        }
        unescaped.push(byte);
    }
    Cow::Owned(unescaped)
}

fn write_string(bytes: &[u8], grammar: &GrammarConfig, out: &mut Vec<u8>) -> Result<()> {
    if bytes.last() == Some(&grammar.escape) {
        return Err(Error::format(
            ScalarKind::String,
            bytes,
            "a string ending in the escape byte cannot be written",
        ));
    }
    out.push(grammar.string_delimiter);
    for &byte in bytes {
        if byte == grammar.string_delimiter {
            out.push(grammar.escape);
        }
        out.push(byte);
    }
    out.push(grammar.string_delimiter);
    Ok(())
}

fn text(kind: ScalarKind, raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(|e| Error::format(kind, raw, e))
}

fn parse_number<T>(kind: ScalarKind, raw: &[u8]) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    if raw.first() == Some(&b'+') {
        return Err(Error::format(kind, raw, "a leading '+' is not allowed"));
    }
    text(kind, raw)?
        .parse::<T>()
        .map_err(|e| Error::format(kind, raw, e))
}

fn parse_decimal(raw: &[u8]) -> Result<Decimal> {
    let kind = ScalarKind::Decimal;
    if raw.first() == Some(&b'+') {
        return Err(Error::format(kind, raw, "a leading '+' is not allowed"));
    }
    let s = text(kind, raw)?;
    match Decimal::from_str(s) {
        Ok(v) => Ok(v),
        Err(_) if s.contains(['e', 'E']) => {
            Decimal::from_scientific(s).map_err(|e| Error::format(kind, raw, e))
        }
        Err(e) => Err(Error::format(kind, raw, e)),
    }
}

fn parse_datetime(raw: &[u8], format: TemporalFormat) -> Result<NaiveDateTime> {
    let kind = ScalarKind::DateTime;
    let s = text(kind, raw)?;
    let pattern = match format {
        TemporalFormat::RoundTrip => ROUND_TRIP_NAIVE,
        TemporalFormat::Rfc1123 => RFC1123,
    };
    NaiveDateTime::parse_from_str(s, pattern).map_err(|e| Error::format(kind, raw, e))
}

fn parse_datetime_offset(
    raw: &[u8],
    format: TemporalFormat,
) -> Result<DateTime<chrono::FixedOffset>> {
    let kind = ScalarKind::DateTimeOffset;
    let s = text(kind, raw)?;
    match format {
        TemporalFormat::RoundTrip => DateTime::parse_from_rfc3339(s),
        TemporalFormat::Rfc1123 => DateTime::parse_from_rfc2822(s),
    }
    .map_err(|e| Error::format(kind, raw, e))
}

/// `[-][d.]hh:mm:ss[.fffffffff]`
fn parse_duration(raw: &[u8]) -> Result<Duration> {
    let kind = ScalarKind::Duration;
    let invalid = |msg: &str| Error::format(kind, raw, msg);

    let s = text(kind, raw)?;
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let first_colon = body.find(':').ok_or_else(|| invalid("expected hh:mm:ss"))?;
    let (days, clock) = match body[..first_colon].find('.') {
        Some(dot) => (digits(&body[..dot]), &body[dot + 1..]),
        None => (Some(0), body),
    };
    let days = days.ok_or_else(|| invalid("invalid day count"))?;

    let mut parts = clock.splitn(3, ':');
    let hours = parts.next().and_then(digits);
    let minutes = parts.next().and_then(digits);
    let (seconds, fraction) = match parts.next() {
        Some(rest) => match rest.split_once('.') {
            Some((secs, frac)) => (digits(secs), Some(frac)),
            None => (digits(rest), None),
        },
        None => (None, None),
    };

    let (hours, minutes, seconds) = match (hours, minutes, seconds) {
        (Some(h), Some(m), Some(s)) if h < 24 && m < 60 && s < 60 => (h, m, s),
        _ => return Err(invalid("expected hh:mm:ss within 23:59:59")),
    };

    let nanos = match fraction {
        None => 0,
        Some(frac) if (1..=9).contains(&frac.len()) => {
            let value = digits(frac).ok_or_else(|| invalid("invalid fractional seconds"))?;
            value * 10_i64.pow(9 - frac.len() as u32)
        }
        Some(_) => return Err(invalid("fractional seconds take 1 to 9 digits")),
    };

    let clock =
        Duration::seconds(hours * 3600 + minutes * 60 + seconds) + Duration::nanoseconds(nanos);
    let total = Duration::try_days(days)
        .and_then(|d| d.checked_add(&clock))
        .ok_or_else(|| invalid("duration out of range"))?;

    Ok(if negative { -total } else { total })
}

fn write_duration(duration: Duration, out: &mut Vec<u8>) -> Result<()> {
    let negative = duration < Duration::zero();
    let duration = if negative { -duration } else { duration };

    let total = duration.num_seconds();
    let nanos = (duration - Duration::seconds(total))
        .num_nanoseconds()
        .unwrap_or(0);
    let days = total / SECONDS_PER_DAY;
    let rem = total % SECONDS_PER_DAY;

    if negative {
        out.push(b'-');
    }
    if days > 0 {
        write!(out, "{}.", days)?;
    }
    write!(out, "{:02}:{:02}:{:02}", rem / 3600, rem % 3600 / 60, rem % 60)?;
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        write!(out, ".{}", fraction.trim_end_matches('0'))?;
    }
    Ok(())
}

/// Non-empty run of ASCII digits.
fn digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
