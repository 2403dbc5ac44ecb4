//! Explicit configuration for fetchers and the transport layer.
//!
//! Nothing in this module reads the process environment. The CLI resolves
//! flags, `.env` values and environment variables into these structs and
//! passes them into each fetcher, so tests can build any configuration in
//! isolation.

use crate::downloader::config::{
    DEFAULT_ALPHA_VANTAGE_RETRY_CEILING, DEFAULT_ALPHA_VANTAGE_RETRY_DELAY_SECS,
    DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_LIMIT, DEFAULT_REQUEST_TIMEOUT_SECS, INITIAL_BACKOFF_MS,
    MAX_BACKOFF_MS, MAX_RETRIES,
};
use crate::fetcher::{FetcherError, FetcherResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// HTTP transport settings shared by every provider
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Retries after the first attempt for 429, 5xx and network failures
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on every further retry
    pub initial_backoff: Duration,
    /// Upper bound for a single backoff delay
    pub max_backoff: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
}

impl TransportConfig {
    /// Backoff delay before retry number `retry_count` (0-based)
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_count);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Binance kline endpoint settings
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// Base URL (e.g., <https://api.binance.com>)
    pub base_url: String,
    /// Klines endpoint path
    pub klines_endpoint: String,
    /// Maximum klines per page (Binance caps this at 1000)
    pub page_limit: usize,
    /// Fixed delay between consecutive pages
    pub page_delay: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            klines_endpoint: "/api/v3/klines".to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }
}

/// CoinGecko market chart settings
#[derive(Clone)]
pub struct CoinGeckoConfig {
    /// Base URL (e.g., <https://api.coingecko.com/api/v3>)
    pub base_url: String,
    /// Quote currency for prices (e.g., "usd")
    pub vs_currency: String,
    /// History depth in days, or "max"
    pub days: String,
    /// Optional demo API key sent as `x_cg_demo_api_key`
    pub api_key: Option<String>,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            days: "365".to_string(),
            api_key: None,
        }
    }
}

impl fmt::Debug for CoinGeckoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinGeckoConfig")
            .field("base_url", &self.base_url)
            .field("vs_currency", &self.vs_currency)
            .field("days", &self.days)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Alpha Vantage `outputsize` hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    /// Full history (premium-only for some functions)
    Full,
    /// Latest 100 data points
    Compact,
}

impl fmt::Display for OutputSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSize::Full => write!(f, "full"),
            OutputSize::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for OutputSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(OutputSize::Full),
            "compact" => Ok(OutputSize::Compact),
            _ => Err(format!("Invalid output size: {s}. Valid options: full, compact")),
        }
    }
}

/// Primary and optional fallback API keys
#[derive(Clone)]
pub struct Credentials {
    primary: String,
    fallback: Option<String>,
}

impl Credentials {
    /// Build credentials, failing when the primary key is missing or blank
    pub fn new(primary: Option<String>, fallback: Option<String>) -> FetcherResult<Self> {
        let primary = primary
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                FetcherError::Configuration(
                    "Alpha Vantage API key missing (set ALPHAVANTAGE_API_KEY or --api-key)"
                        .to_string(),
                )
            })?;

        let fallback = fallback
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty() && *key != primary);

        Ok(Self { primary, fallback })
    }

    /// Primary API key
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Fallback API key, if one is configured
    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("primary", &"<redacted>")
            .field("fallback", &self.fallback.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Alpha Vantage query settings and advisory retry policy
#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    /// Base URL (e.g., <https://www.alphavantage.co>)
    pub base_url: String,
    /// Query endpoint path
    pub query_endpoint: String,
    /// API keys
    pub credentials: Credentials,
    /// Requested output size for functions that accept it
    pub output_size: OutputSize,
    /// Retry with `compact` when `full` is refused as a premium feature
    pub allow_compact_fallback: bool,
    /// Maximum number of calls per instrument, including the first
    pub retry_ceiling: u32,
    /// Delay before retrying a throttled call
    pub retry_delay: Duration,
}

impl AlphaVantageConfig {
    /// Settings with default endpoints and policy for the given credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: "https://www.alphavantage.co".to_string(),
            query_endpoint: "/query".to_string(),
            credentials,
            output_size: OutputSize::Full,
            allow_compact_fallback: true,
            retry_ceiling: DEFAULT_ALPHA_VANTAGE_RETRY_CEILING,
            retry_delay: Duration::from_secs(DEFAULT_ALPHA_VANTAGE_RETRY_DELAY_SECS),
        }
    }
}
