//! Typed values exchanged between the codec and record fields.
//!
//! ## Core Types
//!
//! - [`ScalarKind`]: the 17 scalar kinds a field may hold
//! - [`Value`]: a tagged union with one variant per scalar kind plus [`Value::Array`]
//! - [`FieldType`]: maps a Rust type onto a kind, implemented for every supported
//!   scalar type and for `Vec` of each
//!
//! ## Supported Rust types
//!
//! | Kind | Rust type |
//! |------|-----------|
//! | `string` | `String`, `Arc<str>` |
//! | `bool` | `bool` |
//! | `datetime` | `chrono::NaiveDateTime` |
//! | `datetime_offset` | `chrono::DateTime<FixedOffset>` |
//! | `duration` | `chrono::Duration` |
//! | `uuid` | `uuid::Uuid` |
//! | `i8` .. `u64` | the matching integer type |
//! | `f32`, `f64` | the matching float type |
//! | `decimal` | `rust_decimal::Decimal` |
//!
//! ```rust
//! use kvcfg::{FieldType, ScalarKind, Value};
//!
//! assert_eq!(<u32 as FieldType>::KIND, ScalarKind::U32);
//! assert!(<Vec<u32> as FieldType>::IS_ARRAY);
//!
//! let value = vec![1u32, 2, 3].to_value();
//! assert_eq!(Vec::<u32>::from_value(value), Some(vec![1, 2, 3]));
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One of the scalar categories a field can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Bool,
    DateTime,
    DateTimeOffset,
    Duration,
    Uuid,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
}

impl ScalarKind {
    /// Every kind, in declaration order.
    pub const ALL: [ScalarKind; 17] = [
        ScalarKind::String,
        ScalarKind::Bool,
        ScalarKind::DateTime,
        ScalarKind::DateTimeOffset,
        ScalarKind::Duration,
        ScalarKind::Uuid,
        ScalarKind::I8,
        ScalarKind::U8,
        ScalarKind::I16,
        ScalarKind::U16,
        ScalarKind::I32,
        ScalarKind::U32,
        ScalarKind::I64,
        ScalarKind::U64,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::Decimal,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::DateTime => "datetime",
            ScalarKind::DateTimeOffset => "datetime_offset",
            ScalarKind::Duration => "duration",
            ScalarKind::Uuid => "uuid",
            ScalarKind::I8 => "i8",
            ScalarKind::U8 => "u8",
            ScalarKind::I16 => "i16",
            ScalarKind::U16 => "u16",
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
            ScalarKind::I64 => "i64",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Decimal => "decimal",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed field value.
///
/// Arrays hold scalars of a single kind; they never nest.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(Arc<str>),
    Bool(bool),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Duration(Duration),
    Uuid(Uuid),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Array(Vec<Value>),
}

impl Value {
    /// The scalar kind of this value, or `None` for arrays.
    #[must_use]
    pub fn kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Value::String(_) => ScalarKind::String,
            Value::Bool(_) => ScalarKind::Bool,
            Value::DateTime(_) => ScalarKind::DateTime,
            Value::DateTimeOffset(_) => ScalarKind::DateTimeOffset,
            Value::Duration(_) => ScalarKind::Duration,
            Value::Uuid(_) => ScalarKind::Uuid,
            Value::I8(_) => ScalarKind::I8,
            Value::U8(_) => ScalarKind::U8,
            Value::I16(_) => ScalarKind::I16,
            Value::U16(_) => ScalarKind::U16,
            Value::I32(_) => ScalarKind::I32,
            Value::U32(_) => ScalarKind::U32,
            Value::I64(_) => ScalarKind::I64,
            Value::U64(_) => ScalarKind::U64,
            Value::F32(_) => ScalarKind::F32,
            Value::F64(_) => ScalarKind::F64,
            Value::Decimal(_) => ScalarKind::Decimal,
            Value::Array(_) => return None,
        })
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Human-readable description used in type mismatch errors, e.g. `u32` or `array`.
    pub(crate) fn describe(&self) -> &'static str {
        self.kind().map_or("array", ScalarKind::name)
    }
}

/// A Rust type that can live inside an `Option` field of a record.
///
/// `KIND` is the scalar kind of the type or of its elements; `IS_ARRAY` is true for
/// `Vec<T>`.
pub trait FieldType: Sized {
    const KIND: ScalarKind;
    const IS_ARRAY: bool;

    fn to_value(&self) -> Value;

    /// Converts back from a value, returning `None` when the variant does not match.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! scalar_field_types {
    ($( $ty:ty => $variant:ident, $kind:ident; )*) => {
        $(
            impl FieldType for $ty {
                const KIND: ScalarKind = ScalarKind::$kind;
                const IS_ARRAY: bool = false;

                #[inline]
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                #[inline]
                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl FieldType for Vec<$ty> {
                const KIND: ScalarKind = ScalarKind::$kind;
                const IS_ARRAY: bool = true;

                fn to_value(&self) -> Value {
                    Value::Array(self.iter().map(FieldType::to_value).collect())
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::Array(items) => items
                            .into_iter()
                            .map(<$ty as FieldType>::from_value)
                            .collect(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_field_types! {
    Arc<str> => String, String;
    bool => Bool, Bool;
    NaiveDateTime => DateTime, DateTime;
    DateTime<FixedOffset> => DateTimeOffset, DateTimeOffset;
    Duration => Duration, Duration;
    Uuid => Uuid, Uuid;
    i8 => I8, I8;
    u8 => U8, U8;
    i16 => I16, I16;
    u16 => U16, U16;
    i32 => I32, I32;
    u32 => U32, U32;
    i64 => I64, I64;
    u64 => U64, U64;
    f32 => F32, F32;
    f64 => F64, F64;
    Decimal => Decimal, Decimal;
}

// Owned strings copy out of the interned `Arc<str>`.
impl FieldType for String {
    const KIND: ScalarKind = ScalarKind::String;
    const IS_ARRAY: bool = false;

    fn to_value(&self) -> Value {
        Value::String(Arc::from(self.as_str()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.to_string()),
            _ => None,
        }
    }
}

impl FieldType for Vec<String> {
    const KIND: ScalarKind = ScalarKind::String;
    const IS_ARRAY: bool = true;

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(FieldType::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(String::from_value).collect(),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}
