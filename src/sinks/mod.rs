use anyhow::Result;
use rowsift::cursor::RowRecord;

pub mod jsonl;
pub mod parquet_file;

pub use self::jsonl::JsonlSink;
pub use self::parquet_file::ParquetSink;

pub trait DataSink: Send {
    fn add_record(&mut self, record: &RowRecord) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
