/// Declares a record struct and its [`Record`](crate::Record) implementation in one go.
///
/// Every field must be an `Option<T>` where `T` implements
/// [`FieldType`](crate::FieldType). Fields are registered in declaration order. The
/// wire name defaults to the field name; `field as "wire"` overrides it, which is how
/// names such as `motd[]` or camel-case keys are expressed.
///
/// ```rust
/// use kvcfg::{key_value_record, schema_for};
///
/// key_value_record! {
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct Server {
///         pub hostname: Option<String>,
///         pub max_players as "maxPlayers": Option<u32>,
///         pub motd as "motd[]": Option<Vec<String>>,
///     }
/// }
///
/// let schema = schema_for::<Server>().unwrap();
/// let names: Vec<_> = schema.fields().iter().map(|f| f.name()).collect();
/// assert_eq!(names, ["hostname", "maxPlayers", "motd[]"]);
/// ```
#[macro_export]
macro_rules! key_value_record {
    (@wire $field:ident) => {
        stringify!($field)
    };

    (@wire $field:ident $wire:literal) => {
        $wire
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident $(as $wire:literal)? : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Record for $name {
            fn describe(schema: $crate::SchemaBuilder<Self>) -> $crate::SchemaBuilder<Self> {
                schema
                $(
                    .field(
                        $crate::key_value_record!(@wire $field $($wire)?),
                        |record: &Self| &record.$field,
                        |record: &mut Self| &mut record.$field,
                    )
                )*
            }
        }
    };
}
