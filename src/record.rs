//! Target record types and their field tables.
//!
//! A target type is a plain struct implementing [`Record`]: it names itself
//! and lists its fields in declaration order, each with a getter, a setter and
//! a [`FieldKind`]. The [`target_type!`](crate::target_type) macro writes that
//! table from the struct definition, so no runtime type inspection is needed.
//!
//! [`TypeDescriptor`] is built from the table once and then shared by header
//! validation, materialization, schema derivation and persistence.

use std::{collections::HashMap, fmt};

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::data::{Value, normalize_name};

/// Semantic type tag driving both cell coercion and the relational column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Int16,
    Int32,
    Int64,
    Money,
    Double,
    Single,
    Boolean,
    DateTime,
    Guid,
    /// Any other type; handled as text end to end.
    Unknown,
}

impl FieldKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Int16 => "int16",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Money => "money",
            FieldKind::Double => "double",
            FieldKind::Single => "single",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime => "datetime",
            FieldKind::Guid => "guid",
            FieldKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Rust type that can be stored in a record field.
pub trait FieldValue: Sized {
    const KIND: FieldKind;

    /// Converts a value already coerced to [`Self::KIND`].
    fn from_value(value: Value) -> Result<Self, String>;

    fn to_value(&self) -> Value;
}

macro_rules! primitive_field {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::$kind(inner) => Ok(inner),
                        other => Err(format!(
                            "expected {}, found {}",
                            FieldKind::$kind,
                            other.type_label()
                        )),
                    }
                }

                fn to_value(&self) -> Value {
                    Value::$kind(ToOwned::to_owned(self))
                }
            }
        )+
    };
}

primitive_field! {
    String => Text,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    Decimal => Money,
    f64 => Double,
    f32 => Single,
    bool => Boolean,
    NaiveDateTime => DateTime,
    Uuid => Guid,
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }
}

/// Registers `FromStr + Display` types as [`FieldKind::Unknown`] fields.
///
/// The cell's text is parsed with `FromStr` and the value is stored as text.
#[macro_export]
macro_rules! text_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::record::FieldValue for $ty {
                const KIND: $crate::record::FieldKind = $crate::record::FieldKind::Unknown;

                fn from_value(
                    value: $crate::data::Value,
                ) -> ::std::result::Result<Self, ::std::string::String> {
                    match value {
                        $crate::data::Value::Text(text) => text.trim().parse::<$ty>().map_err(|err| {
                            format!("cannot parse '{}' as {}: {}", text, stringify!($ty), err)
                        }),
                        other => Err(format!("expected text, found {}", other.type_label())),
                    }
                }

                fn to_value(&self) -> $crate::data::Value {
                    $crate::data::Value::Text(self.to_string())
                }
            }
        )+
    };
}

text_field!(NaiveDate, char);

/// One entry of a record's field table.
pub struct Field<R> {
    pub name: &'static str,
    pub kind: FieldKind,
    pub get: fn(&R) -> Value,
    pub set: fn(&mut R, Value) -> Result<(), String>,
}

impl<R> fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A statically-known record shape that spreadsheet rows map onto.
pub trait Record: Default {
    /// Name used in diagnostics and generated table names.
    const TYPE_NAME: &'static str;

    /// Fields in declaration order.
    fn fields() -> Vec<Field<Self>>;
}

/// Declares a struct together with its [`Record`] implementation.
///
/// ```
/// use rust_decimal::Decimal;
///
/// sheet_ingest::target_type! {
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct Car {
///         pub make: String,
///         pub year: i32,
///         pub price: Decimal,
///     }
/// }
///
/// use sheet_ingest::record::Record;
/// assert_eq!(Car::TYPE_NAME, "Car");
/// assert_eq!(Car::fields().len(), 3);
/// ```
#[macro_export]
macro_rules! target_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
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

        impl $crate::record::Record for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn fields() -> ::std::vec::Vec<$crate::record::Field<Self>> {
                vec![
                    $(
                        $crate::record::Field {
                            name: stringify!($field),
                            kind: <$ty as $crate::record::FieldValue>::KIND,
                            get: |record: &Self| {
                                $crate::record::FieldValue::to_value(&record.$field)
                            },
                            set: |record: &mut Self, value: $crate::data::Value| {
                                record.$field =
                                    <$ty as $crate::record::FieldValue>::from_value(value)?;
                                Ok(())
                            },
                        },
                    )*
                ]
            }
        }
    };
}

/// A field of the target type together with its normalized name.
pub struct DescribedField<R> {
    pub name: String,
    pub declared: &'static str,
    pub kind: FieldKind,
    get: fn(&R) -> Value,
    set: fn(&mut R, Value) -> Result<(), String>,
}

impl<R> DescribedField<R> {
    pub fn get(&self, record: &R) -> Value {
        (self.get)(record)
    }

    pub fn set(&self, record: &mut R, value: Value) -> Result<(), String> {
        (self.set)(record, value)
    }
}

/// Introspection result for a target type, built once per importer.
pub struct TypeDescriptor<R> {
    type_name: &'static str,
    fields: Vec<DescribedField<R>>,
    positions: HashMap<String, usize>,
}

impl<R: Record> TypeDescriptor<R> {
    pub fn new() -> Self {
        let mut fields = Vec::new();
        let mut positions = HashMap::new();
        for field in R::fields() {
            let name = normalize_name(field.name);
            if positions.contains_key(&name) {
                warn!(
                    "Field '{}' of '{}' duplicates normalized name '{}'; keeping the first",
                    field.name,
                    R::TYPE_NAME,
                    name
                );
                continue;
            }
            positions.insert(name.clone(), fields.len());
            fields.push(DescribedField {
                name,
                declared: field.name,
                kind: field.kind,
                get: field.get,
                set: field.set,
            });
        }
        Self {
            type_name: R::TYPE_NAME,
            fields,
            positions,
        }
    }
}

impl<R: Record> Default for TypeDescriptor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> TypeDescriptor<R> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[DescribedField<R>] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&DescribedField<R>> {
        self.fields.get(index)
    }

    /// Position of the field whose normalized name equals `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Field values of `record` in declaration order.
    pub fn values(&self, record: &R) -> Vec<Value> {
        self.fields.iter().map(|field| field.get(record)).collect()
    }
}
