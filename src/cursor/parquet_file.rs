use std::fs::File;
use std::path::Path;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow_array::{Array, RecordBatch};
use arrow_schema::{ArrowError, DataType, Schema, TimeUnit};
use bigdecimal::BigDecimal;
use bigdecimal::num_bigint::BigInt;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use super::{Column, DataRecord, RowCursor, check_ordinal};
use crate::error::CursorError;
use crate::value::{Value, ValueKind};

const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

/// A cursor over the rows of a parquet file, read one record batch at a time.
pub struct ParquetCursor {
    reader: ParquetRecordBatchReader,
    columns: Vec<Column>,
    batch: Option<RecordBatch>,
    row: usize,
}

impl ParquetCursor {
    pub fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self, CursorError> {
        let file = File::open(path.as_ref())?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let columns = schema_columns(builder.schema())?;
        let reader = builder.with_batch_size(batch_size.max(1)).build()?;

        tracing::debug!(
            path = %path.as_ref().display(),
            columns = columns.len(),
            "Parquet: opened"
        );

        Ok(ParquetCursor {
            reader,
            columns,
            batch: None,
            row: 0,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn current(&self) -> Result<&RecordBatch, CursorError> {
        self.batch.as_ref().ok_or(CursorError::NoCurrentRow)
    }

    fn column(&self, ordinal: usize) -> Result<&Column, CursorError> {
        check_ordinal(ordinal, self.columns.len())?;
        Ok(&self.columns[ordinal])
    }
}

fn schema_columns(schema: &Schema) -> Result<Vec<Column>, CursorError> {
    schema
        .fields()
        .iter()
        .map(|field| {
            let data_type = field.data_type();
            let kind = column_kind(data_type).ok_or_else(|| CursorError::UnsupportedType {
                column: field.name().clone(),
                data_type: data_type.to_string(),
            })?;
            Ok(Column::new(field.name().as_str(), kind, data_type.to_string()))
        })
        .collect()
}

fn column_kind(data_type: &DataType) -> Option<ValueKind> {
    Some(match data_type {
        DataType::Boolean => ValueKind::Bool,
        DataType::UInt8 => ValueKind::UInt8,
        DataType::Int8 | DataType::Int16 => ValueKind::Int16,
        DataType::UInt16 | DataType::Int32 => ValueKind::Int32,
        DataType::UInt32 | DataType::Int64 => ValueKind::Int64,
        DataType::UInt64 | DataType::Decimal128(_, _) => ValueKind::Decimal,
        DataType::Float32 => ValueKind::Float32,
        DataType::Float64 => ValueKind::Float64,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ValueKind::String,
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView => ValueKind::Bytes,
        DataType::FixedSizeBinary(16) => ValueKind::Guid,
        DataType::FixedSizeBinary(_) => ValueKind::Bytes,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => ValueKind::DateTime,
        _ => return None,
    })
}

/// Read one cell. Timestamps with a time zone are read as UTC.
fn cell(array: &dyn Array, row: usize) -> Result<Value, CursorError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    Ok(match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::UInt8 => Value::UInt8(array.as_primitive::<UInt8Type>().value(row)),
        DataType::Int8 => Value::Int16(i16::from(array.as_primitive::<Int8Type>().value(row))),
        DataType::Int16 => Value::Int16(array.as_primitive::<Int16Type>().value(row)),
        DataType::UInt16 => {
            Value::Int32(i32::from(array.as_primitive::<UInt16Type>().value(row)))
        }
        DataType::Int32 => Value::Int32(array.as_primitive::<Int32Type>().value(row)),
        DataType::UInt32 => {
            Value::Int64(i64::from(array.as_primitive::<UInt32Type>().value(row)))
        }
        DataType::Int64 => Value::Int64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt64 => Value::Decimal(BigDecimal::from(
            array.as_primitive::<UInt64Type>().value(row),
        )),
        DataType::Float32 => Value::Float32(array.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Float64(array.as_primitive::<Float64Type>().value(row)),
        DataType::Decimal128(_, scale) => {
            let unscaled = array.as_primitive::<Decimal128Type>().value(row);
            Value::Decimal(BigDecimal::new(BigInt::from(unscaled), i64::from(*scale)))
        }
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Value::String(array.as_string_view().value(row).to_string()),
        DataType::Binary => Value::Bytes(array.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => Value::Bytes(array.as_binary::<i64>().value(row).to_vec()),
        DataType::BinaryView => Value::Bytes(array.as_binary_view().value(row).to_vec()),
        DataType::FixedSizeBinary(16) => {
            let bytes = array.as_fixed_size_binary().value(row);
            Value::Guid(Uuid::from_slice(bytes).map_err(|err| cast_error(err.to_string()))?)
        }
        DataType::FixedSizeBinary(_) => {
            Value::Bytes(array.as_fixed_size_binary().value(row).to_vec())
        }
        DataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(row);
            let date = UNIX_EPOCH_JULIAN_DAY
                .checked_add(days)
                .and_then(|day| Date::from_julian_day(day).ok())
                .ok_or_else(|| cast_error(format!("Date32 value {days} is out of range")))?;
            Value::DateTime(date.midnight())
        }
        DataType::Date64 => {
            let millis = array.as_primitive::<Date64Type>().value(row);
            Value::DateTime(from_unix_nanos(i128::from(millis) * 1_000_000)?)
        }
        DataType::Timestamp(unit, _) => {
            let nanos = match unit {
                TimeUnit::Second => {
                    i128::from(array.as_primitive::<TimestampSecondType>().value(row))
                        * 1_000_000_000
                }
                TimeUnit::Millisecond => {
                    i128::from(array.as_primitive::<TimestampMillisecondType>().value(row))
                        * 1_000_000
                }
                TimeUnit::Microsecond => {
                    i128::from(array.as_primitive::<TimestampMicrosecondType>().value(row)) * 1_000
                }
                TimeUnit::Nanosecond => {
                    i128::from(array.as_primitive::<TimestampNanosecondType>().value(row))
                }
            };
            Value::DateTime(from_unix_nanos(nanos)?)
        }
        other => {
            return Err(CursorError::UnsupportedType {
                column: String::new(),
                data_type: other.to_string(),
            });
        }
    })
}

fn from_unix_nanos(nanos: i128) -> Result<PrimitiveDateTime, CursorError> {
    let stamp = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|err| cast_error(err.to_string()))?;
    Ok(PrimitiveDateTime::new(stamp.date(), stamp.time()))
}

fn cast_error(message: String) -> CursorError {
    CursorError::Arrow(ArrowError::CastError(message))
}

impl DataRecord for ParquetCursor {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, ordinal: usize) -> Result<&str, CursorError> {
        Ok(&self.column(ordinal)?.name)
    }

    fn field_kind(&self, ordinal: usize) -> Result<ValueKind, CursorError> {
        Ok(self.column(ordinal)?.kind)
    }

    fn data_type_name(&self, ordinal: usize) -> Result<&str, CursorError> {
        Ok(&self.column(ordinal)?.type_name)
    }

    fn is_null(&self, ordinal: usize) -> Result<bool, CursorError> {
        let batch = self.current()?;
        check_ordinal(ordinal, batch.num_columns())?;
        Ok(batch.column(ordinal).is_null(self.row))
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        let batch = self.current()?;
        check_ordinal(ordinal, batch.num_columns())?;
        cell(batch.column(ordinal).as_ref(), self.row)
    }
}

impl RowCursor for ParquetCursor {
    fn advance(&mut self) -> Result<bool, CursorError> {
        if let Some(batch) = &self.batch
            && self.row + 1 < batch.num_rows()
        {
            self.row += 1;
            return Ok(true);
        }

        self.batch = None;
        for next in self.reader.by_ref() {
            let batch = next?;
            if batch.num_rows() > 0 {
                tracing::trace!(rows = batch.num_rows(), "Parquet: batch loaded");
                self.batch = Some(batch);
                self.row = 0;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::RowCursorExt;
    use arrow_array::{
        BooleanArray, Date32Array, Decimal128Array, FixedSizeBinaryArray, Int64Array, StringArray,
        TimestampMillisecondArray,
    };
    use arrow_schema::Field;
    use parquet::arrow::ArrowWriter;
    use std::str::FromStr;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use time::macros::datetime;

    fn write_sample(batch_rows: &[usize]) -> NamedTempFile {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Name", DataType::Utf8, true),
            Field::new("Number", DataType::Int64, false),
        ]));
        let file = NamedTempFile::with_suffix(".parquet").unwrap();
        let mut writer =
            ArrowWriter::try_new(file.reopen().unwrap(), schema.clone(), None).unwrap();

        let mut next = 0i64;
        for &rows in batch_rows {
            let numbers: Vec<i64> = (next..next + rows as i64).collect();
            next += rows as i64;
            let names: Vec<Option<String>> = numbers
                .iter()
                .map(|n| (n % 3 != 2).then(|| format!("Name{n}")))
                .collect();
            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from(names)),
                    Arc::new(Int64Array::from(numbers)),
                ],
            )
            .unwrap();
            writer.write(&batch).unwrap();
        }
        writer.close().unwrap();
        file
    }

    #[test]
    fn test_reads_across_batches() {
        let file = write_sample(&[3, 4]);
        let cursor = ParquetCursor::open(file.path(), 2).unwrap();
        assert_eq!(cursor.columns()[1].type_name, "Int64");

        let numbers: Vec<i64> = cursor
            .records()
            .map(|record| record.unwrap().get_i64(1).unwrap())
            .collect();
        assert_eq!(numbers, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_nulls_and_metadata() {
        let file = write_sample(&[3]);
        let mut cursor = ParquetCursor::open(file.path(), 16).unwrap();
        assert!(matches!(cursor.value(0), Err(CursorError::NoCurrentRow)));

        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.get_string(0).unwrap(), "Name0");
        assert_eq!(cursor.ordinal("number").unwrap(), 1);
        assert_eq!(cursor.field_kind(1).unwrap(), ValueKind::Int64);

        assert!(cursor.advance().unwrap());
        assert!(cursor.advance().unwrap());
        assert!(cursor.is_null(0).unwrap());
        assert!(!cursor.advance().unwrap());
    }

    #[test]
    fn test_typed_columns() {
        let guid = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        let schema = Arc::new(Schema::new(vec![
            Field::new("Flag", DataType::Boolean, false),
            Field::new("Day", DataType::Date32, false),
            Field::new(
                "Stamp",
                DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
                false,
            ),
            Field::new("Price", DataType::Decimal128(10, 2), false),
            Field::new("Id", DataType::FixedSizeBinary(16), false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(BooleanArray::from(vec![true])),
                Arc::new(Date32Array::from(vec![19_797])),
                Arc::new(
                    TimestampMillisecondArray::from(vec![1_710_412_200_000]).with_timezone("UTC"),
                ),
                Arc::new(
                    Decimal128Array::from(vec![1_250])
                        .with_precision_and_scale(10, 2)
                        .unwrap(),
                ),
                Arc::new(
                    FixedSizeBinaryArray::try_from_iter(vec![guid.as_bytes().to_vec()].into_iter())
                        .unwrap(),
                ),
            ],
        )
        .unwrap();

        let file = NamedTempFile::with_suffix(".parquet").unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let mut cursor = ParquetCursor::open(file.path(), 16).unwrap();
        assert!(cursor.advance().unwrap());
        assert!(cursor.get_bool(0).unwrap());
        assert_eq!(cursor.get_datetime(1).unwrap(), datetime!(2024-03-15 0:00));
        assert_eq!(
            cursor.get_datetime(2).unwrap(),
            datetime!(2024-03-14 10:30)
        );
        assert_eq!(
            cursor.get_decimal(3).unwrap(),
            BigDecimal::from_str("12.50").unwrap()
        );
        assert_eq!(cursor.get_guid(4).unwrap(), guid);
    }
}
