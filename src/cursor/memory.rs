use std::sync::Arc;

use super::{Column, DataRecord, RowCursor, check_ordinal};
use crate::error::CursorError;
use crate::value::{Value, ValueKind};

/// A cursor over rows held in memory.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    columns: Arc<[Column]>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryCursorBuilder {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl MemoryCursorBuilder {
    /// Add a column whose type name is the kind's own name.
    pub fn column(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.columns.push(Column::new(name, kind, kind.to_string()));
        self
    }

    pub fn typed_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn row(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }

    pub fn rows<R, I>(self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = Value>,
    {
        rows.into_iter().fold(self, |builder, row| builder.row(row))
    }

    /// Every row must hold exactly one value per column.
    pub fn build(self) -> Result<MemoryCursor, CursorError> {
        let expected = self.columns.len();
        if let Some((row, values)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != expected)
        {
            return Err(CursorError::RowWidth {
                row,
                expected,
                found: values.len(),
            });
        }

        Ok(MemoryCursor {
            columns: self.columns.into(),
            rows: self.rows,
            position: None,
        })
    }
}

impl MemoryCursor {
    pub fn builder() -> MemoryCursorBuilder {
        MemoryCursorBuilder::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn current(&self) -> Result<&[Value], CursorError> {
        self.position
            .and_then(|position| self.rows.get(position))
            .map(Vec::as_slice)
            .ok_or(CursorError::NoCurrentRow)
    }

    fn column(&self, ordinal: usize) -> Result<&Column, CursorError> {
        check_ordinal(ordinal, self.columns.len())?;
        Ok(&self.columns[ordinal])
    }
}

impl DataRecord for MemoryCursor {
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
        Ok(self.value(ordinal)?.is_null())
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        let row = self.current()?;
        check_ordinal(ordinal, row.len())?;
        Ok(row[ordinal].clone())
    }
}

impl RowCursor for MemoryCursor {
    fn advance(&mut self) -> Result<bool, CursorError> {
        let next = self.position.map_or(0, |position| position + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            Ok(true)
        } else {
            self.position = Some(self.rows.len());
            Ok(false)
        }
    }
}
