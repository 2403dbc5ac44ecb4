//! CSV output writer
//!
//! Rows are written to a temporary file in the target directory, which is
//! then persisted over the target path. A failed write leaves any previous
//! file untouched.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{OutputError, OutputResult, OutputWriter};
use crate::{Candle, DailyBar, Observation, PricePoint, Table};

/// Column order for candle files
pub const CANDLE_HEADER: &[&str] = &[
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_asset_volume",
    "num_trades",
    "taker_buy_base_volume",
    "taker_buy_quote_volume",
];

/// Column order for equity bar files
pub const DAILY_BAR_HEADER: &[&str] = &[
    "symbol",
    "date",
    "open",
    "high",
    "low",
    "close",
    "adjusted_close",
    "volume",
];

/// Column order for commodity files
pub const OBSERVATION_HEADER: &[&str] = &["date", "value"];

/// Column order for market chart files
pub const PRICE_POINT_HEADER: &[&str] = &["timestamp", "price", "market_cap", "total_volume"];

#[derive(Debug, Serialize)]
struct CandleRecord {
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    close_time: String,
    quote_asset_volume: f64,
    num_trades: u64,
    taker_buy_base_volume: f64,
    taker_buy_quote_volume: f64,
}

impl From<&Candle> for CandleRecord {
    fn from(candle: &Candle) -> Self {
        Self {
            open_time: format_timestamp(&candle.open_time),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            close_time: format_timestamp(&candle.close_time),
            quote_asset_volume: candle.quote_asset_volume,
            num_trades: candle.num_trades,
            taker_buy_base_volume: candle.taker_buy_base_volume,
            taker_buy_quote_volume: candle.taker_buy_quote_volume,
        }
    }
}

#[derive(Debug, Serialize)]
struct DailyBarRecord<'a> {
    symbol: &'a str,
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adjusted_close: Option<f64>,
    volume: u64,
}

impl<'a> From<&'a DailyBar> for DailyBarRecord<'a> {
    fn from(bar: &'a DailyBar) -> Self {
        Self {
            symbol: &bar.symbol,
            date: format_date(&bar.date),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adjusted_close: bar.adjusted_close,
            volume: bar.volume,
        }
    }
}

#[derive(Debug, Serialize)]
struct ObservationRecord {
    date: String,
    value: f64,
}

impl From<&Observation> for ObservationRecord {
    fn from(observation: &Observation) -> Self {
        Self {
            date: format_date(&observation.date),
            value: observation.value,
        }
    }
}

#[derive(Debug, Serialize)]
struct PricePointRecord {
    timestamp: String,
    price: f64,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

impl From<&PricePoint> for PricePointRecord {
    fn from(point: &PricePoint) -> Self {
        Self {
            timestamp: format_timestamp(&point.timestamp),
            price: point.price,
            market_cap: point.market_cap,
            total_volume: point.total_volume,
        }
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// CSV implementation of [`OutputWriter`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableWriter;

impl OutputWriter for CsvTableWriter {
    fn write_table(&self, table: &Table, path: &Path) -> OutputResult<u64> {
        write_table_to_path(table, path)
    }
}

/// Write `table` to `path` as CSV, replacing any existing file
///
/// # Returns
/// Number of data rows written (header excluded)
///
/// # Errors
/// [`OutputError::IoError`] if the directory, temporary file or final rename
/// fails; [`OutputError::CsvError`] if a row cannot be serialized
pub fn write_table_to_path(table: &Table, path: &Path) -> OutputResult<u64> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

    let rows = {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(&mut temp_file));

        let rows = match table {
            Table::Candles(rows) => {
                write_rows(&mut writer, CANDLE_HEADER, rows.iter().map(CandleRecord::from))?
            }
            Table::Daily(rows) => {
                write_rows(&mut writer, DAILY_BAR_HEADER, rows.iter().map(DailyBarRecord::from))?
            }
            Table::Observations(rows) => write_rows(
                &mut writer,
                OBSERVATION_HEADER,
                rows.iter().map(ObservationRecord::from),
            )?,
            Table::MarketChart(rows) => write_rows(
                &mut writer,
                PRICE_POINT_HEADER,
                rows.iter().map(PricePointRecord::from),
            )?,
        };

        let mut buf_writer = writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to flush CSV writer: {e}")))?;
        buf_writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush: {e}")))?;
        rows
    };

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

    debug!("Wrote {} rows to {}", rows, path.display());
    Ok(rows)
}

fn write_rows<W, R, I>(writer: &mut Writer<W>, header: &[&str], rows: I) -> OutputResult<u64>
where
    W: Write,
    R: Serialize,
    I: IntoIterator<Item = R>,
{
    writer
        .write_record(header)
        .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;

    let mut written = 0u64;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| {
                OutputError::CsvError(format!("Failed to write row {}: {e}", written + 1))
            })?;
        written += 1;
    }

    Ok(written)
}
