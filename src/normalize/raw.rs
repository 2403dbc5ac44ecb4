//! Provider payloads in their native shapes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number that providers send either as a JSON number or as a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    /// JSON number
    Number(serde_json::Number),
    /// Numeric string (e.g., `"42000.10"`)
    Text(String),
}

impl Numeric {
    /// Value as `f64`; `None` for non-numeric or non-finite text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => n.as_f64(),
            Numeric::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Value as `u64`; accepts integral floats such as `"1200.0"`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Numeric::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_u64)),
            Numeric::Text(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_u64))
            }
        }
    }

    /// Value as `i64` (epoch milliseconds)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Numeric::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
            Numeric::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }

    /// Whether this is the given literal text
    pub fn is_text(&self, literal: &str) -> bool {
        matches!(self, Numeric::Text(s) if s.trim() == literal)
    }
}

fn integral_u64(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64)
}

/// One Binance kline, deserialized from its 12-element array form
///
/// `[open_time, open, high, low, close, volume, close_time,
///   quote_asset_volume, num_trades, taker_buy_base, taker_buy_quote, ignore]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawKline {
    /// Open time (ms)
    pub open_time: i64,
    /// Open price
    pub open: Numeric,
    /// High price
    pub high: Numeric,
    /// Low price
    pub low: Numeric,
    /// Close price
    pub close: Numeric,
    /// Base asset volume
    pub volume: Numeric,
    /// Close time (ms, last millisecond of the candle)
    pub close_time: i64,
    /// Quote asset volume
    pub quote_asset_volume: Numeric,
    /// Number of trades
    pub num_trades: Numeric,
    /// Taker buy base asset volume
    pub taker_buy_base_volume: Numeric,
    /// Taker buy quote asset volume
    pub taker_buy_quote_volume: Numeric,
    /// Unused field
    pub ignore: Value,
}

/// One commodity observation (`{"date": "2024-01-01", "value": "74.15"}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Observation date (`YYYY-MM-DD`)
    pub date: String,
    /// Value, or `"."` when the provider has no data for the date
    pub value: Numeric,
}

/// `[epoch_ms, value]` pair from a market chart
pub type ChartPoint = (Numeric, Option<Numeric>);

/// CoinGecko market chart: parallel `[ms, value]` lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMarketChart {
    /// Prices
    pub prices: Vec<ChartPoint>,
    /// Market capitalizations
    #[serde(default)]
    pub market_caps: Vec<ChartPoint>,
    /// 24h total volumes
    #[serde(default)]
    pub total_volumes: Vec<ChartPoint>,
}

/// Raw payload, one variant per provider shape
#[derive(Debug, Clone, PartialEq)]
pub enum RawSeries {
    /// Binance klines
    Klines(Vec<RawKline>),
    /// Alpha Vantage equity series: date-keyed object of `"1. open"`-style fields
    TimeSeries {
        /// Ticker symbol
        instrument: String,
        /// Whether the function returns adjusted close and dividend fields
        adjusted: bool,
        /// Contents of the time series key
        series: Map<String, Value>,
    },
    /// Alpha Vantage commodity series
    Commodity(Vec<RawObservation>),
    /// CoinGecko market chart
    MarketChart(RawMarketChart),
}

impl RawSeries {
    /// Number of raw records
    pub fn len(&self) -> usize {
        match self {
            RawSeries::Klines(klines) => klines.len(),
            RawSeries::TimeSeries { series, .. } => series.len(),
            RawSeries::Commodity(observations) => observations.len(),
            RawSeries::MarketChart(chart) => chart.prices.len(),
        }
    }

    /// Whether the payload holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
