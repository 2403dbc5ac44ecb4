//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Batch failed
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher could not be configured
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output path could not be derived
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Summary could not be rendered
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
