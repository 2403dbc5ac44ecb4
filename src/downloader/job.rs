//! Ingest job definition and per-job report

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::fetcher::SeriesRequest;
use crate::output::{OutputPathBuilder, OutputResult};

/// One instrument to fetch and the file it lands in
#[derive(Debug, Clone)]
pub struct IngestJob {
    /// What to fetch
    pub request: SeriesRequest,
    /// Target CSV file, derived from the request
    pub output_path: PathBuf,
}

impl IngestJob {
    /// Create a job writing to `<data_dir>/<instrument>_<resolution>.csv`
    ///
    /// # Errors
    /// Returns [`crate::output::OutputError::InvalidPath`] if the instrument
    /// or resolution is blank.
    pub fn new(request: SeriesRequest, data_dir: impl AsRef<Path>) -> OutputResult<Self> {
        let output_path = OutputPathBuilder::new(data_dir.as_ref())
            .with_instrument(&request.instrument)
            .with_resolution(&request.resolution)
            .build()?;

        Ok(Self {
            request,
            output_path,
        })
    }
}

/// Outcome of a completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    /// Instrument identifier
    pub instrument: String,
    /// Resolution label
    pub resolution: String,
    /// Provider that served the data
    pub provider: String,
    /// Data rows written (header excluded)
    pub rows_written: u64,
    /// File written
    pub output_path: PathBuf,
    /// Set when the provider served less than was asked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<String>,
    /// Provider-level calls made for this instrument
    pub attempts: u32,
    /// Times the fallback credential was substituted
    pub credential_fallbacks: u32,
}
