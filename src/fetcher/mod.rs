//! Provider fetchers
//!
//! Each provider implements [`HistoricalFetcher`] and returns a
//! [`RawSeries`] variant that the normalizer turns into a table.

use crate::normalize::RawSeries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod advisory;
pub mod alpha_vantage;
pub mod binance;
pub mod coingecko;
pub mod http;
pub mod pagination;
pub mod retry_formatter;

/// Maximum payload characters rendered in error messages
const PAYLOAD_PREVIEW_CHARS: usize = 512;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Network failure or non-2xx status after transport retries
    #[error("transport error{}: {message}", fmt_status(.status))]
    Transport {
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Underlying cause
        message: String,
    },

    /// Provider advisory (throttling or plan limitation) after the retry policy gave up
    #[error("rate limited by provider: {advisory}")]
    RateLimited {
        /// Advisory text returned by the provider
        advisory: String,
    },

    /// Expected key or shape absent from a successful response
    #[error("schema mismatch: {reason} (payload: {})", preview(.payload))]
    SchemaMismatch {
        /// What was expected
        reason: String,
        /// Raw payload for diagnosis
        payload: String,
    },

    /// Provider returned zero records for the requested range
    #[error("no records returned for {instrument}")]
    EmptyResult {
        /// Instrument that came back empty
        instrument: String,
    },

    /// Missing credential or unsupported request parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cursor failed to advance or iteration ceiling reached
    #[error("pagination error: {0}")]
    Pagination(String),
}

impl FetcherError {
    /// Build a [`FetcherError::SchemaMismatch`] carrying the serialized payload
    pub fn schema_mismatch(reason: impl Into<String>, payload: &serde_json::Value) -> Self {
        Self::SchemaMismatch {
            reason: reason.into(),
            payload: payload.to_string(),
        }
    }

    /// Raw payload attached to a schema mismatch
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::SchemaMismatch { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

fn preview(payload: &str) -> String {
    if payload.chars().count() <= PAYLOAD_PREVIEW_CHARS {
        return payload.to_string();
    }
    let head: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// What to fetch for one instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    /// Instrument identifier (symbol, coin id or commodity function)
    pub instrument: String,
    /// Resolution label (Binance interval code, "daily", "monthly", ...)
    pub resolution: String,
    /// Inclusive start boundary
    pub start: Option<DateTime<Utc>>,
    /// Exclusive end boundary
    pub end: Option<DateTime<Utc>>,
}

impl SeriesRequest {
    /// Create a request without time bounds
    pub fn new(instrument: impl Into<String>, resolution: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            resolution: resolution.into(),
            start: None,
            end: None,
        }
    }

    /// Set the inclusive start boundary
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the exclusive end boundary
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}

/// Raw payload plus bookkeeping about how it was obtained
#[derive(Debug, Clone)]
pub struct FetchedSeries {
    /// Provider payload in its native shape
    pub raw: RawSeries,
    /// Set when the provider served less than was asked for
    pub degradation: Option<String>,
    /// HTTP calls issued at the provider level (transport retries excluded)
    pub attempts: u32,
    /// Times the fallback credential was substituted
    pub credential_fallbacks: u32,
}

impl FetchedSeries {
    /// Payload obtained with a single call and no degradation
    pub fn complete(raw: RawSeries) -> Self {
        Self {
            raw,
            degradation: None,
            attempts: 1,
            credential_fallbacks: 0,
        }
    }
}

/// Historical series fetcher
#[async_trait]
pub trait HistoricalFetcher: Send + Sync {
    /// Short provider name used in logs and summaries
    fn provider(&self) -> &'static str;

    /// Fetch the full series for one instrument
    ///
    /// # Errors
    /// Returns [`FetcherError`] on transport failure, provider advisories that
    /// exhausted the retry policy, unexpected payload shapes or empty results.
    async fn fetch(&self, request: &SeriesRequest) -> FetcherResult<FetchedSeries>;
}
