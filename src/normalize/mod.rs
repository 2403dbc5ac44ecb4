//! Raw provider payloads to typed tables
//!
//! [`normalize`] is pure: it borrows the raw series, coerces every field to
//! its typed form, sorts rows ascending by their time key and drops rows
//! whose time key repeats an earlier row. Running [`Table::normalized`] on
//! an already-normalized table returns it unchanged.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::fetcher::{FetcherError, FetcherResult};
use crate::{Candle, DailyBar, Observation, PricePoint};

pub mod raw;

pub use raw::{Numeric, RawKline, RawMarketChart, RawObservation, RawSeries};

/// Alpha Vantage value marking a missing commodity observation
const MISSING_VALUE_MARKER: &str = ".";

/// Row with a primary time column
pub trait TimeKeyed {
    /// Key type, ordered chronologically
    type Key: Ord + Copy;

    /// Primary time column
    fn time_key(&self) -> Self::Key;
}

impl TimeKeyed for Candle {
    type Key = DateTime<Utc>;

    fn time_key(&self) -> Self::Key {
        self.open_time
    }
}

impl TimeKeyed for DailyBar {
    type Key = NaiveDate;

    fn time_key(&self) -> Self::Key {
        self.date
    }
}

impl TimeKeyed for Observation {
    type Key = NaiveDate;

    fn time_key(&self) -> Self::Key {
        self.date
    }
}

impl TimeKeyed for PricePoint {
    type Key = DateTime<Utc>;

    fn time_key(&self) -> Self::Key {
        self.timestamp
    }
}

/// Normalized rows, one variant per record type
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// Binance candles
    Candles(Vec<Candle>),
    /// Alpha Vantage equity bars
    Daily(Vec<DailyBar>),
    /// Alpha Vantage commodity observations
    Observations(Vec<Observation>),
    /// CoinGecko market chart points
    MarketChart(Vec<PricePoint>),
}

impl Table {
    /// Sort ascending by time key and drop repeated keys (first row wins)
    pub fn normalized(self) -> Self {
        match self {
            Table::Candles(rows) => Table::Candles(sort_dedup(rows)),
            Table::Daily(rows) => Table::Daily(sort_dedup(rows)),
            Table::Observations(rows) => Table::Observations(sort_dedup(rows)),
            Table::MarketChart(rows) => Table::MarketChart(sort_dedup(rows)),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Table::Candles(rows) => rows.len(),
            Table::Daily(rows) => rows.len(),
            Table::Observations(rows) => rows.len(),
            Table::MarketChart(rows) => rows.len(),
        }
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_dedup<T: TimeKeyed>(mut rows: Vec<T>) -> Vec<T> {
    rows.sort_by_key(|row| row.time_key());
    rows.dedup_by_key(|row| row.time_key());
    rows
}

/// Normalize a raw provider payload
///
/// # Errors
/// Returns [`FetcherError::SchemaMismatch`] carrying the offending record
/// when a field cannot be coerced.
pub fn normalize(raw: &RawSeries) -> FetcherResult<Table> {
    let table = match raw {
        RawSeries::Klines(klines) => Table::Candles(normalize_klines(klines)?),
        RawSeries::TimeSeries {
            instrument,
            adjusted,
            series,
        } => Table::Daily(normalize_time_series(instrument, *adjusted, series)?),
        RawSeries::Commodity(observations) => {
            Table::Observations(normalize_commodity(observations)?)
        }
        RawSeries::MarketChart(chart) => Table::MarketChart(normalize_market_chart(chart)?),
    };

    Ok(table.normalized())
}

fn normalize_klines(klines: &[RawKline]) -> FetcherResult<Vec<Candle>> {
    klines
        .iter()
        .map(|kline| {
            let bad =
                |field: &str| mismatch(format!("kline field '{field}' is not numeric"), kline);

            Ok(Candle {
                open_time: millis_to_datetime(kline.open_time).ok_or_else(|| bad("open_time"))?,
                open: kline.open.as_f64().ok_or_else(|| bad("open"))?,
                high: kline.high.as_f64().ok_or_else(|| bad("high"))?,
                low: kline.low.as_f64().ok_or_else(|| bad("low"))?,
                close: kline.close.as_f64().ok_or_else(|| bad("close"))?,
                volume: kline.volume.as_f64().ok_or_else(|| bad("volume"))?,
                close_time: millis_to_datetime(kline.close_time).ok_or_else(|| bad("close_time"))?,
                quote_asset_volume: kline
                    .quote_asset_volume
                    .as_f64()
                    .ok_or_else(|| bad("quote_asset_volume"))?,
                num_trades: kline.num_trades.as_u64().ok_or_else(|| bad("num_trades"))?,
                taker_buy_base_volume: kline
                    .taker_buy_base_volume
                    .as_f64()
                    .ok_or_else(|| bad("taker_buy_base_volume"))?,
                taker_buy_quote_volume: kline
                    .taker_buy_quote_volume
                    .as_f64()
                    .ok_or_else(|| bad("taker_buy_quote_volume"))?,
            })
        })
        .collect()
}

fn normalize_time_series(
    instrument: &str,
    adjusted: bool,
    series: &Map<String, Value>,
) -> FetcherResult<Vec<DailyBar>> {
    let volume_key = if adjusted { "6. volume" } else { "5. volume" };

    series
        .iter()
        .map(|(date, fields)| {
            let mut record = Map::new();
            record.insert(date.clone(), fields.clone());
            let record = Value::Object(record);
            let bad = |field: &str| {
                FetcherError::schema_mismatch(
                    format!("time series field '{field}' missing or not numeric for {instrument}"),
                    &record,
                )
            };
            let price = |key: &str| fields.get(key).and_then(coerce_f64).ok_or_else(|| bad(key));

            let adjusted_close = if adjusted {
                Some(price("5. adjusted close")?)
            } else {
                None
            };

            Ok(DailyBar {
                symbol: instrument.to_string(),
                date: parse_date(date).ok_or_else(|| bad("date"))?,
                open: price("1. open")?,
                high: price("2. high")?,
                low: price("3. low")?,
                close: price("4. close")?,
                adjusted_close,
                volume: fields
                    .get(volume_key)
                    .and_then(coerce_u64)
                    .ok_or_else(|| bad(volume_key))?,
            })
        })
        .collect()
}

fn normalize_commodity(observations: &[RawObservation]) -> FetcherResult<Vec<Observation>> {
    let mut rows = Vec::with_capacity(observations.len());

    for observation in observations {
        if observation.value.is_text(MISSING_VALUE_MARKER) {
            continue;
        }

        let bad = |field: &str| {
            mismatch(format!("observation field '{field}' is invalid"), observation)
        };
        rows.push(Observation {
            date: parse_date(&observation.date).ok_or_else(|| bad("date"))?,
            value: observation.value.as_f64().ok_or_else(|| bad("value"))?,
        });
    }

    Ok(rows)
}

fn normalize_market_chart(chart: &RawMarketChart) -> FetcherResult<Vec<PricePoint>> {
    let market_caps = index_by_timestamp(&chart.market_caps, "market_caps")?;
    let total_volumes = index_by_timestamp(&chart.total_volumes, "total_volumes")?;

    chart
        .prices
        .iter()
        .map(|point| {
            let bad =
                |field: &str| mismatch(format!("price point field '{field}' is invalid"), point);
            let ms = point.0.as_i64().ok_or_else(|| bad("timestamp"))?;

            Ok(PricePoint {
                timestamp: millis_to_datetime(ms).ok_or_else(|| bad("timestamp"))?,
                price: point
                    .1
                    .as_ref()
                    .and_then(Numeric::as_f64)
                    .ok_or_else(|| bad("price"))?,
                market_cap: market_caps.get(&ms).copied().flatten(),
                total_volume: total_volumes.get(&ms).copied().flatten(),
            })
        })
        .collect()
}

fn index_by_timestamp(
    points: &[raw::ChartPoint],
    series: &str,
) -> FetcherResult<HashMap<i64, Option<f64>>> {
    points
        .iter()
        .map(|point| {
            let ms = point
                .0
                .as_i64()
                .ok_or_else(|| mismatch(format!("{series} timestamp is invalid"), point))?;
            Ok((ms, point.1.as_ref().and_then(Numeric::as_f64)))
        })
        .collect()
}

fn mismatch<T: serde::Serialize>(reason: String, record: &T) -> FetcherError {
    FetcherError::SchemaMismatch {
        reason,
        payload: serde_json::to_string(record).unwrap_or_default(),
    }
}

/// Epoch milliseconds to UTC timestamp
pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// `YYYY-MM-DD` to date
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// JSON string or number to `f64`
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Numeric::Text(s.clone()).as_f64(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// JSON string or number to `u64`
pub fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => Numeric::Text(s.clone()).as_u64(),
        Value::Number(n) => Numeric::Number(n.clone()).as_u64(),
        _ => None,
    }
}
