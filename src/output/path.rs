//! Deterministic output paths
//!
//! Every instrument maps to exactly one file:
//! `<data-dir>/<instrument>_<resolution>.csv`. Re-running an ingest for the
//! same instrument and resolution overwrites that file.
//!
//! ```rust
//! use market_data_ingest::output::OutputPathBuilder;
//! use std::path::PathBuf;
//!
//! let path = OutputPathBuilder::new("data/raw/crypto")
//!     .with_instrument("BTCUSDT")
//!     .with_resolution("1d")
//!     .build()
//!     .unwrap();
//! assert_eq!(path, PathBuf::from("data/raw/crypto/BTCUSDT_1d.csv"));
//! ```

use super::{OutputError, OutputResult};
use std::path::PathBuf;

/// Path builder for per-instrument CSV files
#[derive(Debug, Clone)]
pub struct OutputPathBuilder {
    data_dir: PathBuf,
    instrument: Option<String>,
    resolution: Option<String>,
}

impl OutputPathBuilder {
    /// Create a builder rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            instrument: None,
            resolution: None,
        }
    }

    /// Set the instrument (sanitized for filesystem safety)
    pub fn with_instrument(mut self, instrument: &str) -> Self {
        self.instrument = Some(sanitize_component(instrument));
        self
    }

    /// Set the resolution label
    pub fn with_resolution(mut self, resolution: &str) -> Self {
        self.resolution = Some(sanitize_component(resolution));
        self
    }

    /// Build the complete file path
    pub fn build(&self) -> OutputResult<PathBuf> {
        let instrument = required(&self.instrument, "instrument")?;
        let resolution = required(&self.resolution, "resolution")?;
        Ok(self
            .data_dir
            .join(format!("{instrument}_{resolution}.csv")))
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> OutputResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| OutputError::InvalidPath(format!("{name} is required")))
}

/// Replace path separators and parent references
///
/// - `..` → `__`
/// - `/`, `\`, `:` → `_`
///
/// Case is preserved.
fn sanitize_component(name: &str) -> String {
    name.trim().replace("..", "__").replace(['/', '\\', ':'], "_")
}
