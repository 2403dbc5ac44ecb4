//! # Market Data Ingest Library
//!
//! Pulls historical market data from public REST APIs and persists it as CSV
//! files for offline research and backtesting.
//!
//! ## Features
//!
//! - **Binance**: spot klines with cursor-based pagination
//! - **CoinGecko**: daily price, market cap and volume history
//! - **Alpha Vantage**: equity time series and commodity series, with
//!   advisory-aware retry (output size downgrade, fallback credential, backoff)
//! - **Transport retries**: 429/5xx/network failures retried with capped
//!   exponential backoff
//! - **Deterministic output**: one CSV per instrument at
//!   `<data-dir>/<instrument>_<resolution>.csv`, fully replaced on every run
//!
//! ## Quick Start
//!
//! ```no_run
//! use market_data_ingest::config::{BinanceConfig, TransportConfig};
//! use market_data_ingest::downloader::{BatchExecutor, IngestJob};
//! use market_data_ingest::fetcher::binance::BinanceKlinesFetcher;
//! use market_data_ingest::fetcher::SeriesRequest;
//! use chrono::{TimeZone, Utc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = BinanceKlinesFetcher::new(BinanceConfig::default(), &TransportConfig::default())?;
//! let request = SeriesRequest::new("BTCUSDT", "1d")
//!     .with_start(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let job = IngestJob::new(request, "data/raw/crypto")?;
//!
//! let reports = BatchExecutor::new(&fetcher).run(&[job]).await?;
//! println!("{} rows written", reports[0].rows_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Provider fetchers, HTTP transport, pagination and advisory retry
//! - [`normalize`] - Raw provider payloads to typed, sorted tables
//! - [`output`] - CSV writer and output path derivation
//! - [`downloader`] - Sequential batch execution
//! - [`config`] - Explicit configuration passed into every fetcher
//! - [`cli`] - Command line front-end

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Explicit configuration structs
pub mod config;

/// Sequential batch execution
pub mod downloader;

/// Provider fetchers and HTTP transport
pub mod fetcher;

/// Raw payload normalization
pub mod normalize;

/// Data output writers
pub mod output;

pub use normalize::{normalize, Table};

/// Binance candlestick after normalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    /// Open time
    pub open_time: DateTime<Utc>,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume (base asset)
    pub volume: f64,
    /// Close time (last millisecond of the candle)
    pub close_time: DateTime<Utc>,
    /// Quote asset volume
    pub quote_asset_volume: f64,
    /// Number of trades
    pub num_trades: u64,
    /// Taker buy base asset volume
    pub taker_buy_base_volume: f64,
    /// Taker buy quote asset volume
    pub taker_buy_quote_volume: f64,
}

/// One row of an Alpha Vantage equity time series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBar {
    /// Ticker symbol the row belongs to
    pub symbol: String,
    /// Trading date (period end for weekly/monthly series)
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Split/dividend adjusted close, only present for adjusted functions
    pub adjusted_close: Option<f64>,
    /// Traded volume
    pub volume: u64,
}

/// One observation of an Alpha Vantage commodity series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Observation date
    pub date: NaiveDate,
    /// Observed value in the series unit
    pub value: f64,
}

/// One point of a CoinGecko market chart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    /// Snapshot time
    pub timestamp: DateTime<Utc>,
    /// Price in the quote currency
    pub price: f64,
    /// Market capitalization, when reported for this timestamp
    pub market_cap: Option<f64>,
    /// 24h total volume, when reported for this timestamp
    pub total_volume: Option<f64>,
}

/// Binance kline interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1 second
    #[serde(rename = "1s")]
    OneSecond,
    /// 1 minute
    #[serde(rename = "1m")]
    OneMinute,
    /// 3 minutes
    #[serde(rename = "3m")]
    ThreeMinutes,
    /// 5 minutes
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minutes
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 30 minutes
    #[serde(rename = "30m")]
    ThirtyMinutes,
    /// 1 hour
    #[serde(rename = "1h")]
    OneHour,
    /// 2 hours
    #[serde(rename = "2h")]
    TwoHours,
    /// 4 hours
    #[serde(rename = "4h")]
    FourHours,
    /// 6 hours
    #[serde(rename = "6h")]
    SixHours,
    /// 8 hours
    #[serde(rename = "8h")]
    EightHours,
    /// 12 hours
    #[serde(rename = "12h")]
    TwelveHours,
    /// 1 day
    #[serde(rename = "1d")]
    OneDay,
    /// 3 days
    #[serde(rename = "3d")]
    ThreeDays,
    /// 1 week
    #[serde(rename = "1w")]
    OneWeek,
    /// 1 month
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    /// Convert interval to milliseconds
    pub fn to_milliseconds(&self) -> i64 {
        match self {
            Interval::OneSecond => 1_000,
            Interval::OneMinute => 60_000,
            Interval::ThreeMinutes => 180_000,
            Interval::FiveMinutes => 300_000,
            Interval::FifteenMinutes => 900_000,
            Interval::ThirtyMinutes => 1_800_000,
            Interval::OneHour => 3_600_000,
            Interval::TwoHours => 7_200_000,
            Interval::FourHours => 14_400_000,
            Interval::SixHours => 21_600_000,
            Interval::EightHours => 28_800_000,
            Interval::TwelveHours => 43_200_000,
            Interval::OneDay => 86_400_000,
            Interval::ThreeDays => 259_200_000,
            Interval::OneWeek => 604_800_000,
            Interval::OneMonth => 2_592_000_000, // Approximate: 30 days
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Interval::OneSecond => "1s",
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
            Interval::ThreeDays => "3d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1s" => Ok(Interval::OneSecond),
            "1m" => Ok(Interval::OneMinute),
            "3m" => Ok(Interval::ThreeMinutes),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "2h" => Ok(Interval::TwoHours),
            "4h" => Ok(Interval::FourHours),
            "6h" => Ok(Interval::SixHours),
            "8h" => Ok(Interval::EightHours),
            "12h" => Ok(Interval::TwelveHours),
            "1d" => Ok(Interval::OneDay),
            "3d" => Ok(Interval::ThreeDays),
            "1w" => Ok(Interval::OneWeek),
            "1M" => Ok(Interval::OneMonth),
            _ => Err(format!("Invalid interval: {s}")),
        }
    }
}
