//! Batch orchestration
//!
//! A batch is a list of [`IngestJob`]s for one provider. [`BatchExecutor`]
//! runs them strictly one after another: fetch, normalize, write, then sleep
//! the inter-instrument delay before the next job. The first error aborts the
//! remaining jobs; files already written stay on disk.
//!
//! # Quick Start
//!
//! ```no_run
//! use market_data_ingest::config::{CoinGeckoConfig, TransportConfig};
//! use market_data_ingest::downloader::{BatchExecutor, IngestJob};
//! use market_data_ingest::fetcher::coingecko::CoinGeckoFetcher;
//! use market_data_ingest::fetcher::SeriesRequest;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = CoinGeckoFetcher::new(CoinGeckoConfig::default(), &TransportConfig::default())?;
//! let jobs = vec![
//!     IngestJob::new(SeriesRequest::new("bitcoin", "daily"), "data/raw/crypto")?,
//!     IngestJob::new(SeriesRequest::new("ethereum", "daily"), "data/raw/crypto")?,
//! ];
//!
//! let reports = BatchExecutor::new(&fetcher)
//!     .with_instrument_delay(Duration::from_secs(6))
//!     .run(&jobs)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::fetcher::FetcherError;
use crate::output::OutputError;

pub mod config;
pub mod executor;
pub mod job;

pub use executor::{batch_progress_bar, BatchExecutor};
pub use job::{IngestJob, JobReport};

/// Batch errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Fetch or normalization failed
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Writing the output file failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}
