use super::DataSink;
use anyhow::{Context, Result};
use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Decimal128Array, FixedSizeBinaryArray, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray, UInt8Array,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use parquet::arrow::ArrowWriter;
use rowsift::cursor::{Column, DataRecord, RowRecord};
use rowsift::{FieldValue, Value, ValueKind};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use time::PrimitiveDateTime;
use uuid::Uuid;

/// Precision and scale for decimal columns whose source type carries none.
const DEFAULT_DECIMAL: (u8, i8) = (38, 10);

/// Buffers records and writes them as Arrow record batches.
///
/// The schema is taken from the configured columns, or from the first record
/// when none were given. Later records are matched to it by column name.
pub struct ParquetSink {
    file: Option<File>,
    writer: Option<ArrowWriter<File>>,
    schema: Option<Arc<Schema>>,
    columns: Vec<Column>,
    column_buffers: Vec<ColumnBuffer>,
    buffered: usize,
    batch_size: usize,
    dropped: u64,
}

enum ColumnBuffer {
    Bool(Vec<Option<bool>>),
    UInt8(Vec<Option<u8>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Decimal {
        precision: u8,
        scale: i8,
        values: Vec<Option<i128>>,
    },
    Timestamp(Vec<Option<i64>>),
    Guid(Vec<Option<[u8; 16]>>),
    Binary(Vec<Option<Vec<u8>>>),
    String(Vec<Option<String>>),
}

impl ParquetSink {
    pub fn new<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create parquet file {:?}", path.as_ref()))?;

        Ok(Self {
            file: Some(file),
            writer: None,
            schema: None,
            columns: Vec::new(),
            column_buffers: Vec::new(),
            buffered: 0,
            batch_size: batch_size.max(1),
            dropped: 0,
        })
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Result<Self> {
        self.init(columns)?;
        Ok(self)
    }

    fn init(&mut self, columns: Vec<Column>) -> Result<()> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|col| Field::new(&col.name, arrow_type(col), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let file = self
            .file
            .take()
            .context("Sink: Parquet writer already initialized")?;
        self.writer = Some(ArrowWriter::try_new(file, schema.clone(), None)?);
        self.column_buffers = columns.iter().map(ColumnBuffer::for_column).collect();
        self.columns = columns;
        self.schema = Some(schema);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffered == 0 {
            return Ok(());
        }
        let Some(schema) = self.schema.clone() else {
            return Ok(());
        };

        let arrays = self
            .column_buffers
            .iter_mut()
            .map(ColumnBuffer::drain_array)
            .collect::<Result<Vec<ArrayRef>>>()?;
        let batch = RecordBatch::try_new(schema, arrays)?;

        if let Some(writer) = self.writer.as_mut() {
            writer.write(&batch)?;
        }
        self.buffered = 0;
        Ok(())
    }
}

impl DataSink for ParquetSink {
    fn add_record(&mut self, record: &RowRecord) -> Result<()> {
        if self.schema.is_none() {
            self.init(record.columns().to_vec())?;
        }

        for (index, col) in self.columns.iter().enumerate() {
            let value = record
                .ordinal(&col.name)
                .and_then(|ordinal| record.value(ordinal))
                .unwrap_or(Value::Null);
            if !self.column_buffers[index].push(&value) {
                self.dropped += 1;
                tracing::debug!(
                    column = %col.name,
                    kind = %col.kind,
                    %value,
                    "Sink: value does not fit its parquet column, writing null"
                );
            }
        }
        self.buffered += 1;

        if self.buffered >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.schema.is_none() {
            self.init(Vec::new())?;
        }
        self.flush()?;
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        if self.dropped > 0 {
            tracing::warn!(
                "Sink: {} values did not fit their parquet column and were written as null",
                self.dropped
            );
        }
        Ok(())
    }
}

/// Decimal precision and scale from a parquet type name such as
/// `Decimal128(10, 2)`.
fn decimal_params(type_name: &str) -> (u8, i8) {
    match type_name.parse::<DataType>() {
        Ok(DataType::Decimal128(precision, scale)) => (precision, scale),
        _ => DEFAULT_DECIMAL,
    }
}

fn arrow_type(column: &Column) -> DataType {
    match column.kind {
        ValueKind::Bool => DataType::Boolean,
        ValueKind::UInt8 => DataType::UInt8,
        ValueKind::Int16 => DataType::Int16,
        ValueKind::Int32 => DataType::Int32,
        ValueKind::Int64 => DataType::Int64,
        ValueKind::Float32 => DataType::Float32,
        ValueKind::Float64 => DataType::Float64,
        ValueKind::Decimal => {
            let (precision, scale) = decimal_params(&column.type_name);
            DataType::Decimal128(precision, scale)
        }
        ValueKind::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        ValueKind::Guid => DataType::FixedSizeBinary(16),
        ValueKind::Bytes => DataType::Binary,
        ValueKind::Char | ValueKind::String | ValueKind::Chars => DataType::Utf8,
    }
}

fn converted<T: FieldValue>(value: &Value) -> Option<T> {
    value.convert(T::KIND).ok().and_then(T::from_value)
}

fn push_converted<T: FieldValue>(values: &mut Vec<Option<T>>, value: &Value) -> bool {
    let cell = converted(value);
    let stored = cell.is_some();
    values.push(cell);
    stored
}

/// Unscaled representation, or `None` when the value needs more digits than
/// `precision`.
fn unscaled_decimal(value: &BigDecimal, precision: u8, scale: i8) -> Option<i128> {
    let (digits, _) = value
        .with_scale_round(i64::from(scale), RoundingMode::HalfEven)
        .into_bigint_and_exponent();
    let unscaled = digits.to_i128()?;
    let limit = 10u128.checked_pow(u32::from(precision))?;
    (unscaled.unsigned_abs() < limit).then_some(unscaled)
}

impl ColumnBuffer {
    fn for_column(column: &Column) -> Self {
        match column.kind {
            ValueKind::Bool => ColumnBuffer::Bool(Vec::new()),
            ValueKind::UInt8 => ColumnBuffer::UInt8(Vec::new()),
            ValueKind::Int16 => ColumnBuffer::Int16(Vec::new()),
            ValueKind::Int32 => ColumnBuffer::Int32(Vec::new()),
            ValueKind::Int64 => ColumnBuffer::Int64(Vec::new()),
            ValueKind::Float32 => ColumnBuffer::Float32(Vec::new()),
            ValueKind::Float64 => ColumnBuffer::Float64(Vec::new()),
            ValueKind::Decimal => {
                let (precision, scale) = decimal_params(&column.type_name);
                ColumnBuffer::Decimal {
                    precision,
                    scale,
                    values: Vec::new(),
                }
            }
            ValueKind::DateTime => ColumnBuffer::Timestamp(Vec::new()),
            ValueKind::Guid => ColumnBuffer::Guid(Vec::new()),
            ValueKind::Bytes => ColumnBuffer::Binary(Vec::new()),
            ValueKind::Char | ValueKind::String | ValueKind::Chars => {
                ColumnBuffer::String(Vec::new())
            }
        }
    }

    /// Values that do not convert to the column type are written as nulls.
    /// Returns `false` when a non-null value was dropped that way.
    fn push(&mut self, value: &Value) -> bool {
        let stored = match self {
            ColumnBuffer::Bool(values) => push_converted(values, value),
            ColumnBuffer::UInt8(values) => push_converted(values, value),
            ColumnBuffer::Int16(values) => push_converted(values, value),
            ColumnBuffer::Int32(values) => push_converted(values, value),
            ColumnBuffer::Int64(values) => push_converted(values, value),
            ColumnBuffer::Float32(values) => push_converted(values, value),
            ColumnBuffer::Float64(values) => push_converted(values, value),
            ColumnBuffer::String(values) => push_converted(values, value),
            ColumnBuffer::Decimal {
                precision,
                scale,
                values,
            } => {
                let unscaled = converted::<BigDecimal>(value)
                    .and_then(|decimal| unscaled_decimal(&decimal, *precision, *scale));
                values.push(unscaled);
                unscaled.is_some()
            }
            ColumnBuffer::Timestamp(values) => {
                let micros = converted::<PrimitiveDateTime>(value).and_then(|v| {
                    i64::try_from(v.assume_utc().unix_timestamp_nanos() / 1_000).ok()
                });
                values.push(micros);
                micros.is_some()
            }
            ColumnBuffer::Guid(values) => {
                let bytes = converted::<Uuid>(value).map(|guid| *guid.as_bytes());
                values.push(bytes);
                bytes.is_some()
            }
            ColumnBuffer::Binary(values) => push_converted(values, value),
        };
        stored || value.is_null()
    }

    fn drain_array(&mut self) -> Result<ArrayRef> {
        Ok(match self {
            ColumnBuffer::Bool(values) => Arc::new(BooleanArray::from(std::mem::take(values))),
            ColumnBuffer::UInt8(values) => Arc::new(UInt8Array::from(std::mem::take(values))),
            ColumnBuffer::Int16(values) => Arc::new(Int16Array::from(std::mem::take(values))),
            ColumnBuffer::Int32(values) => Arc::new(Int32Array::from(std::mem::take(values))),
            ColumnBuffer::Int64(values) => Arc::new(Int64Array::from(std::mem::take(values))),
            ColumnBuffer::Float32(values) => Arc::new(Float32Array::from(std::mem::take(values))),
            ColumnBuffer::Float64(values) => Arc::new(Float64Array::from(std::mem::take(values))),
            ColumnBuffer::Decimal {
                precision,
                scale,
                values,
            } => Arc::new(
                Decimal128Array::from(std::mem::take(values))
                    .with_precision_and_scale(*precision, *scale)?,
            ),
            ColumnBuffer::Timestamp(values) => {
                Arc::new(TimestampMicrosecondArray::from(std::mem::take(values)))
            }
            ColumnBuffer::Guid(values) => Arc::new(
                FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                    std::mem::take(values).into_iter(),
                    16,
                )?,
            ),
            ColumnBuffer::Binary(values) => {
                let array: BinaryArray = values.iter().map(|v| v.as_deref()).collect();
                values.clear();
                Arc::new(array)
            }
            ColumnBuffer::String(values) => Arc::new(StringArray::from(std::mem::take(values))),
        })
    }
}
