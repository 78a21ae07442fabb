use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{DataRecord, RowCursor, check_ordinal};
use crate::error::CursorError;
use crate::value::{Value, ValueKind};

/// A cursor over newline-delimited JSON objects.
///
/// Each line is its own row and carries its own field list, so names, kinds
/// and type names describe the current row only. Blank lines are skipped.
pub struct JsonlCursor<R> {
    reader: R,
    line: usize,
    buffer: String,
    row: Option<JsonRow>,
}

struct JsonRow {
    names: Vec<String>,
    values: Vec<Value>,
    type_names: Vec<&'static str>,
}

impl JsonlCursor<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CursorError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlCursor<R> {
    pub fn new(reader: R) -> Self {
        JsonlCursor {
            reader,
            line: 0,
            buffer: String::new(),
            row: None,
        }
    }

    /// One-based number of the line the cursor is positioned on.
    pub fn line(&self) -> usize {
        self.line
    }

    fn current(&self) -> Result<&JsonRow, CursorError> {
        self.row.as_ref().ok_or(CursorError::NoCurrentRow)
    }

    fn parse_line(&self) -> Result<JsonRow, CursorError> {
        let parsed: serde_json::Value =
            serde_json::from_str(&self.buffer).map_err(|source| CursorError::Json {
                line: self.line,
                source,
            })?;
        let serde_json::Value::Object(object) = parsed else {
            return Err(CursorError::NotAnObject { line: self.line });
        };

        let mut row = JsonRow {
            names: Vec::with_capacity(object.len()),
            values: Vec::with_capacity(object.len()),
            type_names: Vec::with_capacity(object.len()),
        };
        for (name, json) in &object {
            row.names.push(name.clone());
            row.type_names.push(json_type_name(json));
            row.values.push(Value::from_json(json));
        }
        Ok(row)
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl<R: BufRead> DataRecord for JsonlCursor<R> {
    fn field_count(&self) -> usize {
        self.row.as_ref().map_or(0, |row| row.names.len())
    }

    fn name(&self, ordinal: usize) -> Result<&str, CursorError> {
        let row = self.current()?;
        check_ordinal(ordinal, row.names.len())?;
        Ok(&row.names[ordinal])
    }

    /// Null fields report [`ValueKind::String`].
    fn field_kind(&self, ordinal: usize) -> Result<ValueKind, CursorError> {
        Ok(self.value(ordinal)?.kind().unwrap_or(ValueKind::String))
    }

    fn data_type_name(&self, ordinal: usize) -> Result<&str, CursorError> {
        let row = self.current()?;
        check_ordinal(ordinal, row.type_names.len())?;
        Ok(row.type_names[ordinal])
    }

    fn is_null(&self, ordinal: usize) -> Result<bool, CursorError> {
        Ok(self.value(ordinal)?.is_null())
    }

    fn value(&self, ordinal: usize) -> Result<Value, CursorError> {
        let row = self.current()?;
        check_ordinal(ordinal, row.values.len())?;
        Ok(row.values[ordinal].clone())
    }
}

impl<R: BufRead> RowCursor for JsonlCursor<R> {
    fn advance(&mut self) -> Result<bool, CursorError> {
        self.row = None;
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(false);
            }
            self.line += 1;
            if self.buffer.trim().is_empty() {
                continue;
            }
            self.row = Some(self.parse_line()?);
            return Ok(true);
        }
    }
}
