//! Row cursors and the record sequences built on top of them.
//!
//! A [`RowCursor`] is a forward-only tabular source positioned on one row at a
//! time. [`RowCursorExt::records`] turns it into an iterator of
//! [`RowRecord`]s: each record is a snapshot of the row it was produced from,
//! so records stay valid after the cursor moves on.

mod jsonl;
mod memory;
mod parquet_file;
mod record;

use std::iter::FusedIterator;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::error::CursorError;
use crate::shape::FieldValue;
use crate::value::{Value, ValueKind};

pub use self::jsonl::JsonlCursor;
pub use self::memory::{MemoryCursor, MemoryCursorBuilder};
pub use self::parquet_file::ParquetCursor;
pub use self::record::RowRecord;

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ValueKind,
    /// Source-specific type name, e.g. `Int64` for parquet or `number` for JSON.
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ValueKind, type_name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            kind,
            type_name: type_name.into(),
        }
    }
}

/// Random access to the fields of the current row.
///
/// Ordinals are zero-based. Metadata accessors work whenever the schema is
/// known; value accessors fail with [`CursorError::NoCurrentRow`] unless the
/// source is positioned on a row.
pub trait DataRecord {
    fn field_count(&self) -> usize;

    fn name(&self, ordinal: usize) -> Result<&str, CursorError>;

    fn field_kind(&self, ordinal: usize) -> Result<ValueKind, CursorError>;

    fn data_type_name(&self, ordinal: usize) -> Result<&str, CursorError>;

    fn is_null(&self, ordinal: usize) -> Result<bool, CursorError>;

    /// The stored value; [`Value::Null`] for a null field.
    fn value(&self, ordinal: usize) -> Result<Value, CursorError>;

    /// Case-sensitive match first, then case-insensitive.
    fn ordinal(&self, name: &str) -> Result<usize, CursorError> {
        let mut folded = None;
        for ordinal in 0..self.field_count() {
            let candidate = self.name(ordinal)?;
            if candidate == name {
                return Ok(ordinal);
            }
            if folded.is_none() && candidate.eq_ignore_ascii_case(name) {
                folded = Some(ordinal);
            }
        }
        folded.ok_or_else(|| CursorError::UnknownColumn(name.to_string()))
    }

    /// Copy the current row into `out`, returning the number of values written.
    fn values(&self, out: &mut [Value]) -> Result<usize, CursorError> {
        let count = self.field_count().min(out.len());
        for (ordinal, slot) in out.iter_mut().take(count).enumerate() {
            *slot = self.value(ordinal)?;
        }
        Ok(count)
    }

    fn value_by_name(&self, name: &str) -> Result<Value, CursorError> {
        self.value(self.ordinal(name)?)
    }

    fn get_bool(&self, ordinal: usize) -> Result<bool, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_u8(&self, ordinal: usize) -> Result<u8, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_i16(&self, ordinal: usize) -> Result<i16, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_i32(&self, ordinal: usize) -> Result<i32, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_i64(&self, ordinal: usize) -> Result<i64, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_f32(&self, ordinal: usize) -> Result<f32, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_f64(&self, ordinal: usize) -> Result<f64, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_decimal(&self, ordinal: usize) -> Result<BigDecimal, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_datetime(&self, ordinal: usize) -> Result<PrimitiveDateTime, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_guid(&self, ordinal: usize) -> Result<Uuid, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_char(&self, ordinal: usize) -> Result<char, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_string(&self, ordinal: usize) -> Result<String, CursorError> {
        cast(ordinal, self.value(ordinal)?)
    }

    /// Copy bytes of a binary field starting at `offset` into `buffer`.
    ///
    /// Returns the number of bytes copied, or the full field length when no
    /// buffer is given.
    fn get_bytes(
        &self,
        ordinal: usize,
        offset: usize,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, CursorError> {
        let bytes: Vec<u8> = cast(ordinal, self.value(ordinal)?)?;
        Ok(copy_block(&bytes, offset, buffer))
    }

    /// Like [`DataRecord::get_bytes`] for character fields. String fields are
    /// read as their characters.
    fn get_chars(
        &self,
        ordinal: usize,
        offset: usize,
        buffer: Option<&mut [char]>,
    ) -> Result<usize, CursorError> {
        let chars: Vec<char> = match self.value(ordinal)? {
            Value::String(s) => s.chars().collect(),
            other => cast(ordinal, other)?,
        };
        Ok(copy_block(&chars, offset, buffer))
    }

    /// Typed access through any [`FieldValue`]; `Option<V>` accepts nulls.
    fn get_as<V: FieldValue>(&self, ordinal: usize) -> Result<V, CursorError>
    where
        Self: Sized,
    {
        cast(ordinal, self.value(ordinal)?)
    }

    fn get_as_by_name<V: FieldValue>(&self, name: &str) -> Result<V, CursorError>
    where
        Self: Sized,
    {
        self.get_as(self.ordinal(name)?)
    }
}

/// A forward-only source of rows.
pub trait RowCursor: DataRecord {
    /// Move to the next row. `Ok(false)` once the source is exhausted.
    fn advance(&mut self) -> Result<bool, CursorError>;
}

impl<C: RowCursor + ?Sized> RowCursor for &mut C {
    fn advance(&mut self) -> Result<bool, CursorError> {
        (**self).advance()
    }
}

impl<C: DataRecord + ?Sized> DataRecord for &mut C {
    fn field_count(&self) -> usize {
        (**self).field_count()
    }

    fn name(&self, ordinal: usize) -> Result<&str, CursorError> {
        (**self).name(ordinal)
    }

    fn field_kind(&self, ordinal: usize) -> Result<ValueKind, CursorError> {
        (**self).field_kind(ordinal)
    }

    fn data_type_name(&self, ordinal: usize) -> Result<&str, CursorError> {
        (**self).data_type_name(ordinal)
    }

    fn is_null(&self, ordinal: usize) -> Result<bool, CursorError> {
        (**self).is_null(ordinal)
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        (**self).value(ordinal)
    }

    fn ordinal(&self, name: &str) -> Result<usize, CursorError> {
        (**self).ordinal(name)
    }
}

pub trait RowCursorExt: RowCursor + Sized {
    /// Single-pass sequence of snapshots, one per remaining row.
    fn records(self) -> Records<Self> {
        Records {
            cursor: self,
            columns: None,
            done: false,
        }
    }
}

impl<C: RowCursor> RowCursorExt for C {}

/// Iterator returned by [`RowCursorExt::records`].
///
/// Fused: after the cursor is exhausted, or after the first cursor error has
/// been yielded, it yields nothing.
pub struct Records<C> {
    cursor: C,
    columns: Option<Arc<[Column]>>,
    done: bool,
}

impl<C: RowCursor> Iterator for Records<C> {
    type Item = Result<RowRecord, CursorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let captured = match self.cursor.advance() {
            Ok(true) => RowRecord::capture(&self.cursor, self.columns.as_ref()),
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(err) => Err(err),
        };

        match captured {
            Ok(record) => {
                self.columns = Some(record.shared_columns());
                Some(Ok(record))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<C: RowCursor> FusedIterator for Records<C> {}

/// Read the metadata of every column of `record`.
pub fn columns_of<D: DataRecord + ?Sized>(record: &D) -> Result<Vec<Column>, CursorError> {
    (0..record.field_count())
        .map(|ordinal| {
            Ok(Column::new(
                record.name(ordinal)?,
                record.field_kind(ordinal)?,
                record.data_type_name(ordinal)?,
            ))
        })
        .collect()
}

pub(crate) fn check_ordinal(ordinal: usize, count: usize) -> Result<(), CursorError> {
    if ordinal < count {
        Ok(())
    } else {
        Err(CursorError::OrdinalOutOfRange { ordinal, count })
    }
}

fn cast<V: FieldValue>(ordinal: usize, value: Value) -> Result<V, CursorError> {
    let found = value
        .kind()
        .map_or_else(|| "null".to_string(), |kind| kind.to_string());
    V::from_value(value).ok_or(CursorError::InvalidCast {
        ordinal,
        expected: V::KIND,
        found,
    })
}

fn copy_block<T: Copy>(source: &[T], offset: usize, buffer: Option<&mut [T]>) -> usize {
    let Some(buffer) = buffer else {
        return source.len();
    };
    let available = source.get(offset..).unwrap_or_default();
    let count = available.len().min(buffer.len());
    buffer[..count].copy_from_slice(&available[..count]);
    count
}
