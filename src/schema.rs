//! Field descriptors, schemas and the process-wide schema cache.
//!
//! A [`Schema`] lists a record type's fields in declaration order. Each
//! [`FieldDescriptor`] carries the field's wire name, scalar kind, array flag and a
//! getter/setter pair that moves [`Value`]s in and out of the record.
//!
//! Record types describe themselves through the [`Record`] trait, usually generated by
//! [`key_value_record!`](crate::key_value_record). Schemas are built once per type by
//! [`schema_for`] and shared afterwards.
//!
//! ## Name lookup
//!
//! Wire names are indexed by their xxHash64 in a flat array parallel to the field list.
//! Lookups hash the incoming key, scan the array and then compare the full name, so two
//! distinct names never alias. Building fails when two fields hash equal, whether they
//! are true duplicates or a collision.
//!
//! ## Manual registration
//!
//! ```rust
//! use kvcfg::{Record, Schema, SchemaBuilder};
//!
//! #[derive(Default)]
//! struct Limits {
//!     max_players: Option<u32>,
//!     banned: Option<Vec<String>>,
//! }
//!
//! impl Record for Limits {
//!     fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
//!         schema
//!             .field("maxPlayers", |r: &Self| &r.max_players, |r: &mut Self| &mut r.max_players)
//!             .field("banned[]", |r: &Self| &r.banned, |r: &mut Self| &mut r.banned)
//!     }
//! }
//!
//! let schema = Schema::<Limits>::build().unwrap();
//! assert_eq!(schema.len(), 2);
//! assert!(schema.find(b"banned[]").is_some());
//! assert!(schema.find(b"banned").is_none());
//! ```

use crate::grammar::GrammarConfig;
use crate::value::{FieldType, ScalarKind, Value};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use xxhash_rust::xxh64::xxh64;

const HASH_SEED: u64 = 0;

/// Reads a field out of a record. `None` means the field is absent.
pub type Getter<R> = Arc<dyn Fn(&R) -> Option<Value> + Send + Sync>;

/// Stores a parsed value into a record.
pub type Setter<R> = Arc<dyn Fn(&mut R, Value) -> Result<()> + Send + Sync>;

/// A record type whose fields can be read from and written to key-value text.
///
/// Every field must be able to represent absence; fields missing from the input keep
/// their `Default` value.
pub trait Record: Default + 'static {
    /// Lists the record's fields in the order they are written.
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self>;
}

/// Metadata and accessors for one record field.
pub struct FieldDescriptor<R> {
    wire_name: Box<[u8]>,
    kind: ScalarKind,
    is_array: bool,
    get: Getter<R>,
    set: Setter<R>,
}

impl<R> FieldDescriptor<R> {
    pub fn wire_name(&self) -> &[u8] {
        &self.wire_name
    }

    /// The wire name as text. Wire names are always valid UTF-8.
    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.wire_name).unwrap_or_default()
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Current value of the field, `None` when absent.
    pub fn get(&self, record: &R) -> Option<Value> {
        (self.get)(record)
    }

    /// Assigns `value` to the field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] when the value does not fit the field.
    pub fn set(&self, record: &mut R, value: Value) -> Result<()> {
        (self.set)(record, value)
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("wire_name", &self.name())
            .field("kind", &self.kind)
            .field("is_array", &self.is_array)
            .finish()
    }
}

/// Collects field registrations for a record type.
///
/// Registration errors are deferred to [`SchemaBuilder::build`] so calls can be chained.
pub struct SchemaBuilder<R> {
    fields: Vec<FieldDescriptor<R>>,
}

impl<R: 'static> SchemaBuilder<R> {
    #[must_use]
    pub fn new() -> Self {
        SchemaBuilder { fields: Vec::new() }
    }

    /// Registers an `Option<T>` field through a pair of projections.
    ///
    /// `None` is read as an absent field; a parsed value is stored as `Some`.
    #[must_use]
    pub fn field<T, G, S>(self, wire_name: &str, get: G, set: S) -> Self
    where
        T: FieldType + 'static,
        G: Fn(&R) -> &Option<T> + Send + Sync + 'static,
        S: Fn(&mut R) -> &mut Option<T> + Send + Sync + 'static,
    {
        let name = wire_name.to_string();
        let getter: Getter<R> = Arc::new(move |record: &R| get(record).as_ref().map(T::to_value));
        let setter: Setter<R> = Arc::new(move |record: &mut R, value: Value| {
            let found = value.describe();
            match T::from_value(value) {
                Some(v) => {
                    *set(record) = Some(v);
                    Ok(())
                }
                None => Err(Error::type_mismatch(
                    &name,
                    &expected_type(T::KIND, T::IS_ARRAY),
                    found,
                )),
            }
        });
        self.field_raw(wire_name, T::KIND, T::IS_ARRAY, getter, setter)
    }

    /// Registers a field through value-level accessors.
    #[must_use]
    pub fn field_raw(
        mut self,
        wire_name: &str,
        kind: ScalarKind,
        is_array: bool,
        get: Getter<R>,
        set: Setter<R>,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            wire_name: wire_name.as_bytes().into(),
            kind,
            is_array,
            get,
            set,
        });
        self
    }

    /// Validates the registrations and indexes the wire names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for an empty wire name, a wire name containing bytes the
    /// default grammar treats as structure, or two wire names with the same hash. Other
    /// dialects are checked by [`Schema::check`].
    pub fn build(self) -> Result<Schema<R>> {
        let record = type_name::<R>();
        let mut hashes: Vec<u64> = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            check_wire_name(record, field.wire_name(), GrammarConfig::shared())?;

            let hash = wire_hash(field.wire_name());
            if let Some(existing) = hashes.iter().position(|h| *h == hash) {
                let other = self.fields[existing].name();
                let msg = if other == field.name() {
                    format!("duplicate wire name '{}'", field.name())
                } else {
                    format!("wire names '{}' and '{}' hash to the same value", other, field.name())
                };
                return Err(Error::schema(record, msg));
            }
            hashes.push(hash);
        }

        Ok(Schema {
            record,
            fields: self.fields,
            hashes: hashes.into_boxed_slice(),
        })
    }
}

impl<R: 'static> Default for SchemaBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete field mapping of one record type.
pub struct Schema<R> {
    record: &'static str,
    fields: Vec<FieldDescriptor<R>>,
    hashes: Box<[u64]>,
}

impl<R: Record> Schema<R> {
    /// Builds a fresh, uncached schema for `R`.
    ///
    /// # Errors
    ///
    /// See [`SchemaBuilder::build`].
    pub fn build() -> Result<Self> {
        R::describe(SchemaBuilder::new()).build()
    }
}

impl<R> Schema<R> {
    /// Looks a field up by its wire name.
    pub fn find(&self, wire_name: &[u8]) -> Option<&FieldDescriptor<R>> {
        self.position(wire_name).map(|index| &self.fields[index])
    }

    /// Declaration index of the field named `wire_name`.
    pub fn position(&self, wire_name: &[u8]) -> Option<usize> {
        let hash = wire_hash(wire_name);
        self.hashes
            .iter()
            .enumerate()
            .filter(|(_, h)| **h == hash)
            .map(|(index, _)| index)
            .find(|index| self.fields[*index].wire_name() == wire_name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor<R>] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor<R>> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of the record type the schema describes.
    pub fn record_name(&self) -> &'static str {
        self.record
    }

    /// Checks that every wire name can be written and read back under `grammar`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] naming the first wire name that contains one of the
    /// dialect's structural bytes or its comment start.
    pub fn check(&self, grammar: &GrammarConfig) -> Result<()> {
        self.fields
            .iter()
            .try_for_each(|field| check_wire_name(self.record, field.wire_name(), grammar))
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("record", &self.record)
            .field("fields", &self.fields)
            .finish()
    }
}

fn wire_hash(wire_name: &[u8]) -> u64 {
    xxh64(wire_name, HASH_SEED)
}

fn expected_type(kind: ScalarKind, is_array: bool) -> String {
    if is_array {
        format!("array of {}", kind)
    } else {
        kind.to_string()
    }
}

/// Wire names must survive a write/read cycle under `grammar`: no whitespace,
/// newline, key-value separator, terminator, string delimiter or comment start.
fn check_wire_name(record: &str, wire_name: &[u8], grammar: &GrammarConfig) -> Result<()> {
    if wire_name.is_empty() {
        return Err(Error::schema(record, "empty wire name"));
    }
    let reserved = |b: &u8| {
        b.is_ascii_whitespace()
            || grammar.is_filler(*b)
            || *b == grammar.key_value_separator
            || *b == grammar.string_delimiter
    };
    let comment_start = grammar.comment_start.as_bytes();
    let has_comment = !comment_start.is_empty()
        && wire_name.windows(comment_start.len()).any(|w| w == comment_start);
    if wire_name.iter().any(reserved) || has_comment {
        return Err(Error::schema(
            record,
            format!(
                "wire name '{}' contains a reserved byte",
                String::from_utf8_lossy(wire_name)
            ),
        ));
    }
    Ok(())
}

type CachedSchema = Arc<dyn Any + Send + Sync>;

static CACHE: Lazy<RwLock<HashMap<TypeId, CachedSchema>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the shared schema for `R`, building it on first use.
///
/// Concurrent first callers may each build a schema; the first one published wins and
/// the others are dropped. Readers only ever see fully built schemas.
///
/// # Errors
///
/// Returns [`Error::Schema`] when `R` cannot be described. Failed builds are not cached.
pub fn schema_for<R>() -> Result<Arc<Schema<R>>>
where
    R: Record,
{
    let key = TypeId::of::<R>();
    if let Some(cached) = CACHE.read().get(&key) {
        trace!(record = type_name::<R>(), "schema cache hit");
        return downcast(Arc::clone(cached));
    }

    let built: CachedSchema = Arc::new(Schema::<R>::build()?);
    let published = Arc::clone(CACHE.write().entry(key).or_insert_with(|| {
        debug!(record = type_name::<R>(), "schema published");
        built
    }));
    downcast(published)
}

/// Drops the cached schema for `R`. Returns whether one was cached.
pub fn evict<R: 'static>() -> bool {
    let removed = CACHE.write().remove(&TypeId::of::<R>()).is_some();
    if removed {
        debug!(record = type_name::<R>(), "schema evicted");
    }
    removed
}

/// Drops every cached schema.
pub fn clear_schemas() {
    CACHE.write().clear();
}

fn downcast<R: Record>(cached: CachedSchema) -> Result<Arc<Schema<R>>> {
    cached
        .downcast::<Schema<R>>()
        .map_err(|_| Error::schema(type_name::<R>(), "cached schema has a different type"))
}
