//! Data output writers

use crate::Table;
use std::path::Path;

pub mod csv;
pub mod path;

pub use self::csv::{write_table_to_path, CsvTableWriter};
pub use self::path::OutputPathBuilder;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Output path could not be derived
    #[error("invalid output path: {0}")]
    InvalidPath(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes a normalized table to a file, replacing any previous content
pub trait OutputWriter: Send + Sync {
    /// Write `table` to `path`; returns the number of data rows written
    fn write_table(&self, table: &Table, path: &Path) -> OutputResult<u64>;
}
