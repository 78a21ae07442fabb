//! Runtime values and the conversion rules between primitive kinds.

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::{datetime, format_description};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use uuid::Uuid;

use crate::error::ConvertError;

/// The closed set of primitive kinds a field or literal can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    UInt8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    DateTime,
    Guid,
    Char,
    String,
    Bytes,
    Chars,
}

impl ValueKind {
    /// Value kinds get a zero default when the stored value is null;
    /// reference kinds stay absent.
    pub fn is_value_type(self) -> bool {
        !matches!(self, ValueKind::String | ValueKind::Bytes | ValueKind::Chars)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueKind::UInt8 | ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64
        )
    }

    fn is_numeric(self) -> bool {
        self.is_integer()
            || matches!(
                self,
                ValueKind::Float32 | ValueKind::Float64 | ValueKind::Decimal | ValueKind::Bool
            )
    }

    /// The value substituted for a null of this kind.
    pub fn default_value(self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::UInt8 => Value::UInt8(0),
            ValueKind::Int16 => Value::Int16(0),
            ValueKind::Int32 => Value::Int32(0),
            ValueKind::Int64 => Value::Int64(0),
            ValueKind::Float32 => Value::Float32(0.0),
            ValueKind::Float64 => Value::Float64(0.0),
            ValueKind::Decimal => Value::Decimal(BigDecimal::zero()),
            ValueKind::DateTime => Value::DateTime(datetime!(1970-01-01 0:00)),
            ValueKind::Guid => Value::Guid(Uuid::nil()),
            ValueKind::Char => Value::Char('\0'),
            ValueKind::String | ValueKind::Bytes | ValueKind::Chars => Value::Null,
        }
    }

    /// Whether [`Value::convert`] supports this pair at all. Individual values
    /// may still fail (parse errors, overflow).
    pub fn can_convert_to(self, to: ValueKind) -> bool {
        if self == to || self == ValueKind::String {
            return true;
        }
        match (self, to) {
            (ValueKind::Bytes, _) => false,
            (_, ValueKind::String) => true,
            (ValueKind::Char, other) | (other, ValueKind::Char) => other.is_integer(),
            (from, to) => from.is_numeric() && to.is_numeric(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::UInt8 => "uint8",
            ValueKind::Int16 => "int16",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::Decimal => "decimal",
            ValueKind::DateTime => "datetime",
            ValueKind::Guid => "guid",
            ValueKind::Char => "char",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Chars => "chars",
        };
        f.write_str(name)
    }
}

/// A single field or literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    UInt8(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(BigDecimal),
    DateTime(PrimitiveDateTime),
    Guid(Uuid),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    Chars(Vec<char>),
}

/// Intermediate form for conversions between numeric-like kinds.
enum Number {
    Int(i128),
    Float(f64),
    Decimal(BigDecimal),
}

impl Value {
    /// `None` for null.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => ValueKind::Bool,
            Value::UInt8(_) => ValueKind::UInt8,
            Value::Int16(_) => ValueKind::Int16,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Guid(_) => ValueKind::Guid,
            Value::Char(_) => ValueKind::Char,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Chars(_) => ValueKind::Chars,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to `to`. A value already of that kind is returned unchanged and
    /// null stays null.
    pub fn convert(&self, to: ValueKind) -> Result<Value, ConvertError> {
        let Some(from) = self.kind() else {
            return Ok(Value::Null);
        };
        if from == to {
            return Ok(self.clone());
        }
        if !from.can_convert_to(to) {
            return Err(ConvertError::Unsupported { from, to });
        }

        match self {
            Value::String(text) => parse_as(text, to),
            _ if to == ValueKind::String => self
                .render()
                .map(Value::String)
                .ok_or(ConvertError::Unsupported { from, to }),
            _ => convert_number(self.as_number(), to),
        }
    }

    /// Order two values of the same kind. Mixed kinds and nulls are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::UInt8(a), Value::UInt8(b)) => a.partial_cmp(b),
            (Value::Int16(a), Value::Int16(b)) => a.partial_cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.partial_cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
            (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Guid(a), Value::Guid(b)) => a.partial_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.partial_cmp(b),
            (Value::Chars(a), Value::Chars(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Plain JSON rendering used by the output sinks.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::UInt8(v) => Json::from(*v),
            Value::Int16(v) => Json::from(*v),
            Value::Int32(v) => Json::from(*v),
            Value::Int64(v) => Json::from(*v),
            Value::Float32(v) => Json::from(f64::from(*v)),
            Value::Float64(v) => Json::from(*v),
            Value::Bytes(v) => Json::from(v.clone()),
            other => other.render().map(Json::String).unwrap_or(Json::Null),
        }
    }

    /// Map a JSON value onto the closest primitive kind.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Bool(*v),
            Json::Number(n) => match n.as_i64() {
                Some(v) => Value::Int64(v),
                None => n.as_f64().map_or(Value::Null, Value::Float64),
            },
            Json::String(s) => Value::String(s.clone()),
            nested => Value::String(nested.to_string()),
        }
    }

    fn render(&self) -> Option<String> {
        Some(match self {
            Value::Null | Value::Bytes(_) => return None,
            Value::Bool(v) => v.to_string(),
            Value::UInt8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Float32(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::DateTime(v) => v
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .ok()?,
            Value::Guid(v) => v.to_string(),
            Value::Char(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Chars(v) => v.iter().collect(),
        })
    }

    fn as_number(&self) -> Number {
        match self {
            Value::Bool(v) => Number::Int(i128::from(*v)),
            Value::UInt8(v) => Number::Int(i128::from(*v)),
            Value::Int16(v) => Number::Int(i128::from(*v)),
            Value::Int32(v) => Number::Int(i128::from(*v)),
            Value::Int64(v) => Number::Int(i128::from(*v)),
            Value::Char(v) => Number::Int(i128::from(u32::from(*v))),
            Value::Float32(v) => Number::Float(f64::from(*v)),
            Value::Float64(v) => Number::Float(*v),
            Value::Decimal(v) => Number::Decimal(v.clone()),
            // Guarded by can_convert_to.
            _ => Number::Int(0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            other => f.write_str(&other.render().unwrap_or_default()),
        }
    }
}

fn convert_number(number: Number, to: ValueKind) -> Result<Value, ConvertError> {
    let overflow = |text: String| ConvertError::Overflow { text, to };

    match to {
        ValueKind::Bool => Ok(Value::Bool(match number {
            Number::Int(v) => v != 0,
            Number::Float(v) => v != 0.0,
            Number::Decimal(v) => !v.is_zero(),
        })),
        ValueKind::Float32 => match number {
            Number::Int(v) => Ok(Value::Float32(v as f32)),
            Number::Float(v) => Ok(Value::Float32(v as f32)),
            Number::Decimal(v) => v
                .to_f32()
                .map(Value::Float32)
                .ok_or_else(|| overflow(v.to_string())),
        },
        ValueKind::Float64 => match number {
            Number::Int(v) => Ok(Value::Float64(v as f64)),
            Number::Float(v) => Ok(Value::Float64(v)),
            Number::Decimal(v) => v
                .to_f64()
                .map(Value::Float64)
                .ok_or_else(|| overflow(v.to_string())),
        },
        ValueKind::Decimal => match number {
            Number::Int(v) => i64::try_from(v)
                .map(|v| Value::Decimal(BigDecimal::from(v)))
                .map_err(|_| overflow(v.to_string())),
            Number::Float(v) => BigDecimal::from_f64(v)
                .map(Value::Decimal)
                .ok_or_else(|| overflow(v.to_string())),
            Number::Decimal(v) => Ok(Value::Decimal(v)),
        },
        _ => {
            let integral = match number {
                Number::Int(v) => v,
                Number::Float(v) if v.is_finite() => v.round_ties_even() as i128,
                Number::Float(v) => return Err(overflow(v.to_string())),
                Number::Decimal(v) => v
                    .round(0)
                    .to_i128()
                    .ok_or_else(|| overflow(v.to_string()))?,
            };
            narrow_integer(integral, to).ok_or_else(|| overflow(integral.to_string()))
        }
    }
}

fn narrow_integer(value: i128, to: ValueKind) -> Option<Value> {
    match to {
        ValueKind::UInt8 => u8::try_from(value).ok().map(Value::UInt8),
        ValueKind::Int16 => i16::try_from(value).ok().map(Value::Int16),
        ValueKind::Int32 => i32::try_from(value).ok().map(Value::Int32),
        ValueKind::Int64 => i64::try_from(value).ok().map(Value::Int64),
        ValueKind::Char => u32::try_from(value)
            .ok()
            .and_then(char::from_u32)
            .map(Value::Char),
        _ => None,
    }
}

fn parse_as(text: &str, to: ValueKind) -> Result<Value, ConvertError> {
    let invalid = || ConvertError::Invalid {
        text: text.to_string(),
        to,
    };
    let trimmed = text.trim();

    match to {
        ValueKind::Bool => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(invalid())
            }
        }
        ValueKind::UInt8 => parse_integer(trimmed, to).map(Value::UInt8),
        ValueKind::Int16 => parse_integer(trimmed, to).map(Value::Int16),
        ValueKind::Int32 => parse_integer(trimmed, to).map(Value::Int32),
        ValueKind::Int64 => parse_integer(trimmed, to).map(Value::Int64),
        ValueKind::Float32 => trimmed.parse().map(Value::Float32).map_err(|_| invalid()),
        ValueKind::Float64 => trimmed.parse().map(Value::Float64).map_err(|_| invalid()),
        ValueKind::Decimal => BigDecimal::from_str(trimmed)
            .map(Value::Decimal)
            .map_err(|_| invalid()),
        ValueKind::DateTime => parse_datetime(trimmed)
            .map(Value::DateTime)
            .ok_or_else(invalid),
        ValueKind::Guid => Uuid::parse_str(trimmed)
            .map(Value::Guid)
            .map_err(|_| invalid()),
        ValueKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(invalid()),
            }
        }
        ValueKind::String => Ok(Value::String(text.to_string())),
        ValueKind::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
        ValueKind::Chars => Ok(Value::Chars(text.chars().collect())),
    }
}

fn parse_integer<T>(text: &str, to: ValueKind) -> Result<T, ConvertError>
where
    T: FromStr<Err = ParseIntError>,
{
    text.parse::<T>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ConvertError::Overflow {
            text: text.to_string(),
            to,
        },
        _ => ConvertError::Invalid {
            text: text.to_string(),
            to,
        },
    })
}

/// Parse date text the way date literals are read: `M/d/yyyy`, `M-d-yyyy` or
/// `yyyy-MM-dd`, optionally followed by `H:mm[:ss]`, or RFC 3339.
pub fn parse_datetime(text: &str) -> Option<PrimitiveDateTime> {
    let text = text.trim();
    if let Ok(stamp) = OffsetDateTime::parse(text, &Rfc3339) {
        let utc = stamp.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }

    let (date_part, time_part) = match text.split_once(char::is_whitespace) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (text, None),
    };

    let date = Date::parse(
        date_part,
        format_description!("[month padding:none]/[day padding:none]/[year]"),
    )
    .or_else(|_| {
        Date::parse(
            date_part,
            format_description!("[month padding:none]-[day padding:none]-[year]"),
        )
    })
    .or_else(|_| Date::parse(date_part, format_description!("[year]-[month]-[day]")))
    .ok()?;

    let time = match time_part {
        None => Time::MIDNIGHT,
        Some(time) => Time::parse(
            time,
            format_description!("[hour padding:none]:[minute]:[second]"),
        )
        .or_else(|_| Time::parse(time, format_description!("[hour padding:none]:[minute]")))
        .ok()?,
    };

    Some(PrimitiveDateTime::new(date, time))
}
