use std::sync::Arc;

use super::{Column, DataRecord, check_ordinal, columns_of};
use crate::error::{CursorError, EvalError};
use crate::shape::Dynamic;
use crate::value::{Value, ValueKind};

/// An owned snapshot of one cursor row.
///
/// Records produced from rows with the same schema share one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl RowRecord {
    pub fn new(columns: Arc<[Column]>, values: Vec<Value>) -> Result<Self, CursorError> {
        if columns.len() != values.len() {
            return Err(CursorError::RowWidth {
                row: 0,
                expected: columns.len(),
                found: values.len(),
            });
        }
        Ok(RowRecord { columns, values })
    }

    /// Snapshot the current row of `source`, reusing `previous` when the
    /// schema has not changed.
    pub fn capture<D: DataRecord + ?Sized>(
        source: &D,
        previous: Option<&Arc<[Column]>>,
    ) -> Result<Self, CursorError> {
        let columns = match previous {
            Some(columns) if same_schema(source, columns)? => Arc::clone(columns),
            _ => columns_of(source)?.into(),
        };
        let values = (0..columns.len())
            .map(|ordinal| source.value(ordinal))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RowRecord { columns, values })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn shared_columns(&self) -> Arc<[Column]> {
        Arc::clone(&self.columns)
    }

    /// Field names in column order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.name.clone(), value.to_json()))
            .collect()
    }

    fn column(&self, ordinal: usize) -> Result<&Column, CursorError> {
        check_ordinal(ordinal, self.columns.len())?;
        Ok(&self.columns[ordinal])
    }
}

fn same_schema<D: DataRecord + ?Sized>(
    source: &D,
    columns: &[Column],
) -> Result<bool, CursorError> {
    if source.field_count() != columns.len() {
        return Ok(false);
    }
    for (ordinal, column) in columns.iter().enumerate() {
        if source.name(ordinal)? != column.name
            || source.field_kind(ordinal)? != column.kind
            || source.data_type_name(ordinal)? != column.type_name
        {
            return Ok(false);
        }
    }
    Ok(true)
}

impl DataRecord for RowRecord {
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
        check_ordinal(ordinal, self.values.len())?;
        Ok(self.values[ordinal].is_null())
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        check_ordinal(ordinal, self.values.len())?;
        Ok(self.values[ordinal].clone())
    }
}

impl Dynamic for RowRecord {
    fn resolve(&self, name: &str) -> Option<Value> {
        let ordinal = self.ordinal(name).ok()?;
        self.values.get(ordinal).cloned()
    }

    /// Nulls read as the zero value of value kinds and stay null for
    /// reference kinds; other values are converted.
    fn resolve_as(&self, name: &str, kind: ValueKind) -> Result<Value, EvalError> {
        let value = self
            .ordinal(name)
            .ok()
            .and_then(|ordinal| self.values.get(ordinal))
            .ok_or_else(|| EvalError::UnresolvedMember {
                name: name.to_string(),
            })?;

        match value.kind() {
            None => Ok(kind.default_value()),
            Some(found) if found == kind => Ok(value.clone()),
            Some(_) => Ok(value.convert(kind)?),
        }
    }

    fn member_names(&self) -> Vec<String> {
        self.names().map(str::to_string).collect()
    }
}
