use super::DataSink;
use anyhow::{Context, Result};
use rowsift::cursor::RowRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes each record as one JSON object per line.
pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create jsonl file {:?}", path.as_ref()))?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn stdout() -> Result<Self> {
        Ok(Self::from_writer(Box::new(std::io::stdout())))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl DataSink for JsonlSink {
    fn add_record(&mut self, record: &RowRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &record.to_json())?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
