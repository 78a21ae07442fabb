//! Target shapes: statically declared records and dynamically resolved members.

use bigdecimal::BigDecimal;
use std::collections::HashMap;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::error::EvalError;
use crate::value::{Value, ValueKind};

/// A declared field of a static shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: ValueKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        FieldDef { name, kind }
    }
}

/// What the compiler binds `[Field]` references against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape<'a> {
    /// Fields known up front; unknown names fail compilation.
    Static(&'a [FieldDef]),
    /// Members resolved by name on each instance at evaluation time.
    Dynamic,
}

/// A statically shaped element. Usually implemented with [`impl_record!`].
pub trait Record {
    const FIELDS: &'static [FieldDef];

    /// Value of the field at `index` in [`Record::FIELDS`].
    fn field(&self, index: usize) -> Value;
}

/// An element whose members are looked up by name at run time.
pub trait Dynamic {
    /// `None` when the instance has no such member. A member holding null
    /// resolves to `Some(Value::Null)`.
    fn resolve(&self, name: &str) -> Option<Value>;

    /// Resolve and convert to `kind`.
    fn resolve_as(&self, name: &str, kind: ValueKind) -> Result<Value, EvalError> {
        let value = self
            .resolve(name)
            .ok_or_else(|| EvalError::UnresolvedMember {
                name: name.to_string(),
            })?;
        Ok(value.convert(kind)?)
    }

    fn member_names(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<D: Dynamic + ?Sized> Dynamic for &D {
    fn resolve(&self, name: &str) -> Option<Value> {
        (**self).resolve(name)
    }

    fn resolve_as(&self, name: &str, kind: ValueKind) -> Result<Value, EvalError> {
        (**self).resolve_as(name, kind)
    }

    fn member_names(&self) -> Vec<String> {
        (**self).member_names()
    }
}

impl<D: Dynamic + ?Sized> Dynamic for Box<D> {
    fn resolve(&self, name: &str) -> Option<Value> {
        (**self).resolve(name)
    }

    fn resolve_as(&self, name: &str, kind: ValueKind) -> Result<Value, EvalError> {
        (**self).resolve_as(name, kind)
    }

    fn member_names(&self) -> Vec<String> {
        (**self).member_names()
    }
}

impl Dynamic for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn member_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl Dynamic for serde_json::Map<String, serde_json::Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from_json)
    }

    fn member_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

/// Rust types that can back a record field.
pub trait FieldValue: Sized {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    /// Strict extraction: only a value of exactly [`FieldValue::KIND`] matches.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! field_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )+
    };
}

field_value! {
    bool => Bool,
    u8 => UInt8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    BigDecimal => Decimal,
    PrimitiveDateTime => DateTime,
    Uuid => Guid,
    char => Char,
    String => String,
    Vec<u8> => Bytes,
    Vec<char> => Chars,
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Implement [`Record`] for a struct by listing its filterable fields.
///
/// ```
/// use rowsift::impl_record;
///
/// struct Sample {
///     name: String,
///     number: i32,
/// }
///
/// impl_record!(Sample {
///     "Name" => name: String,
///     "Number" => number: i32,
/// });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($name:literal => $field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::shape::Record for $ty {
            const FIELDS: &'static [$crate::shape::FieldDef] = &[
                $($crate::shape::FieldDef::new(
                    $name,
                    <$fty as $crate::shape::FieldValue>::KIND,
                )),+
            ];

            fn field(&self, index: usize) -> $crate::value::Value {
                let getters: &[fn(&Self) -> $crate::value::Value] = &[
                    $(|record: &Self| $crate::shape::FieldValue::to_value(&record.$field)),+
                ];
                getters
                    .get(index)
                    .map_or($crate::value::Value::Null, |get| get(self))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person {
        name: String,
        age: Option<i32>,
    }

    crate::impl_record!(Person {
        "Name" => name: String,
        "Age" => age: Option<i32>,
    });

    #[test]
    fn test_macro_declares_fields() {
        assert_eq!(
            Person::FIELDS,
            &[
                FieldDef::new("Name", ValueKind::String),
                FieldDef::new("Age", ValueKind::Int32),
            ]
        );

        let person = Person {
            name: "Ada".into(),
            age: None,
        };
        assert_eq!(person.field(0), Value::String("Ada".into()));
        assert_eq!(person.field(1), Value::Null);
        assert_eq!(person.field(7), Value::Null);
    }

    #[test]
    fn test_field_value_is_strict() {
        assert_eq!(i32::from_value(Value::Int32(5)), Some(5));
        assert_eq!(i32::from_value(Value::Int64(5)), None);
        assert_eq!(Option::<i32>::from_value(Value::Null), Some(None));
    }

    #[test]
    fn test_map_resolution() {
        let mut map = HashMap::new();
        map.insert("Number".to_string(), Value::Int64(7));

        assert_eq!(map.resolve("Number"), Some(Value::Int64(7)));
        assert_eq!(map.resolve_as("Number", ValueKind::Int32), Ok(Value::Int32(7)));
        assert_eq!(
            map.resolve_as("Missing", ValueKind::Int32),
            Err(EvalError::UnresolvedMember {
                name: "Missing".into()
            })
        );
    }
}
