//! Ingest commands
//!
//! One subcommand per provider. Each resolves its flags (and any `.env` or
//! environment credentials) into explicit config structs, builds one
//! [`IngestJob`] per instrument and hands the batch to [`BatchExecutor`].

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::CliError;
use crate::config::{
    AlphaVantageConfig, BinanceConfig, CoinGeckoConfig, Credentials, OutputSize, TransportConfig,
};
use crate::downloader::config::{
    DEFAULT_ALPHA_VANTAGE_RETRY_CEILING, DEFAULT_ALPHA_VANTAGE_RETRY_DELAY_SECS,
    DEFAULT_ALPHA_VANTAGE_SYMBOL_DELAY_SECS, DEFAULT_COINGECKO_COINS,
    DEFAULT_COINGECKO_SYMBOL_DELAY_SECS, DEFAULT_COMMODITIES, DEFAULT_COMMODITIES_DATA_DIR,
    DEFAULT_CRYPTO_DATA_DIR, DEFAULT_CRYPTO_INTERVAL, DEFAULT_CRYPTO_START_DATE,
    DEFAULT_CRYPTO_SYMBOLS, DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_LIMIT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STOCKS_DATA_DIR, DEFAULT_STOCK_SYMBOLS,
};
use crate::downloader::{batch_progress_bar, BatchExecutor, IngestJob, JobReport};
use crate::fetcher::alpha_vantage::{AlphaVantageFetcher, AlphaVantageFunction};
use crate::fetcher::binance::BinanceKlinesFetcher;
use crate::fetcher::coingecko::{CoinGeckoFetcher, COINGECKO_RESOLUTION};
use crate::fetcher::{HistoricalFetcher, SeriesRequest};
use crate::Interval;

/// Binance caps klines per request at 1000
const MAX_PAGE_LIMIT: usize = 1000;

/// Market Data Ingest CLI
#[derive(Parser, Debug)]
#[command(name = "market-data-ingest")]
#[command(about = "Ingest historical market data into per-instrument CSV files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Summary format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Maximum transport retries for 429, 5xx and network failures (default: 5, range: 1-20)
    #[arg(
        long,
        global = true,
        default_value = "5",
        value_parser = clap::value_parser!(u32).range(1..=20)
    )]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Binance spot klines
    Crypto(CryptoArgs),

    /// CoinGecko daily price, market cap and volume history
    Coingecko(CoinGeckoArgs),

    /// Alpha Vantage equity time series
    Stocks(StocksArgs),

    /// Alpha Vantage commodity series
    Commodities(CommoditiesArgs),
}

/// Summary format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// `crypto` arguments
#[derive(Args, Debug)]
pub struct CryptoArgs {
    /// Comma-separated Binance symbols (default: BTCUSDT,ETHUSDT)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Kline interval (1s, 1m, ..., 1d, 1w, 1M)
    #[arg(long, default_value = DEFAULT_CRYPTO_INTERVAL)]
    pub interval: Interval,

    /// Start (YYYY-MM-DD or RFC 3339), inclusive
    #[arg(long, default_value = DEFAULT_CRYPTO_START_DATE)]
    pub start_date: String,

    /// End (YYYY-MM-DD or RFC 3339), exclusive; defaults to now
    #[arg(long)]
    pub end_date: Option<String>,

    /// Klines per request (1-1000)
    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT, value_parser = parse_page_limit)]
    pub page_limit: usize,

    /// Delay between pages in milliseconds
    #[arg(long, default_value_t = DEFAULT_PAGE_DELAY_MS)]
    pub page_delay_ms: u64,

    /// Delay between symbols in seconds
    #[arg(long, default_value_t = 0)]
    pub symbol_delay_secs: u64,

    /// Output directory
    #[arg(long, default_value = DEFAULT_CRYPTO_DATA_DIR)]
    pub data_dir: PathBuf,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// `coingecko` arguments
#[derive(Args, Debug)]
pub struct CoinGeckoArgs {
    /// Comma-separated CoinGecko coin ids (default: bitcoin,ethereum)
    #[arg(long, value_delimiter = ',')]
    pub coins: Option<Vec<String>>,

    /// Quote currency
    #[arg(long, default_value = "usd")]
    pub vs_currency: String,

    /// History depth in days, or "max"
    #[arg(long, default_value = "365")]
    pub days: String,

    /// Demo API key
    #[arg(long, env = "COINGECKO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Delay between coins in seconds
    #[arg(long, default_value_t = DEFAULT_COINGECKO_SYMBOL_DELAY_SECS)]
    pub symbol_delay_secs: u64,

    /// Output directory
    #[arg(long, default_value = DEFAULT_CRYPTO_DATA_DIR)]
    pub data_dir: PathBuf,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Alpha Vantage credentials and advisory retry policy
#[derive(Args, Debug)]
pub struct AlphaVantageArgs {
    /// API key
    #[arg(long, env = "ALPHAVANTAGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Fallback API key, tried once when the primary key receives an advisory
    #[arg(long, env = "ALPHAVANTAGE_API_KEY_FALLBACK", hide_env_values = true)]
    pub fallback_api_key: Option<String>,

    /// Calls per instrument before a throttling advisory is fatal
    #[arg(
        long,
        default_value_t = DEFAULT_ALPHA_VANTAGE_RETRY_CEILING,
        value_parser = clap::value_parser!(u32).range(1..=10)
    )]
    pub retry_ceiling: u32,

    /// Seconds to wait after a throttling advisory
    #[arg(long, default_value_t = DEFAULT_ALPHA_VANTAGE_RETRY_DELAY_SECS)]
    pub retry_delay_secs: u64,

    /// Delay between instruments in seconds
    #[arg(long, default_value_t = DEFAULT_ALPHA_VANTAGE_SYMBOL_DELAY_SECS)]
    pub symbol_delay_secs: u64,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

impl AlphaVantageArgs {
    fn config(&self) -> Result<AlphaVantageConfig, CliError> {
        let credentials = Credentials::new(self.api_key.clone(), self.fallback_api_key.clone())?;
        let mut config = AlphaVantageConfig::new(credentials);
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        config.retry_ceiling = self.retry_ceiling;
        config.retry_delay = Duration::from_secs(self.retry_delay_secs);
        Ok(config)
    }
}

/// `stocks` arguments
#[derive(Args, Debug)]
pub struct StocksArgs {
    /// Comma-separated ticker symbols (default: AAPL,MSFT,TSLA)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Time series function
    #[arg(long, default_value = "TIME_SERIES_DAILY_ADJUSTED")]
    pub function: AlphaVantageFunction,

    /// Requested output size (full or compact)
    #[arg(long, default_value = "full")]
    pub output_size: OutputSize,

    /// Fail instead of downgrading to compact when full is a premium feature
    #[arg(long, default_value_t = false)]
    pub no_compact_fallback: bool,

    /// Output directory
    #[arg(long, default_value = DEFAULT_STOCKS_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Credentials and retry policy
    #[command(flatten)]
    pub alpha_vantage: AlphaVantageArgs,
}

/// `commodities` arguments
#[derive(Args, Debug)]
pub struct CommoditiesArgs {
    /// Comma-separated commodity functions (default: WTI,BRENT,NATURAL_GAS)
    #[arg(long, value_delimiter = ',')]
    pub commodities: Option<Vec<String>>,

    /// Series interval (daily, weekly, monthly, quarterly, annual)
    #[arg(long, default_value = "monthly")]
    pub interval: String,

    /// Output directory
    #[arg(long, default_value = DEFAULT_COMMODITIES_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Credentials and retry policy
    #[command(flatten)]
    pub alpha_vantage: AlphaVantageArgs,
}

impl Cli {
    /// Transport settings from the global flags
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_retries: self.max_retries,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportConfig::default()
        }
    }

    /// Run the selected command and print the summary
    ///
    /// # Errors
    /// Any configuration, fetch or write error; the batch stops at the first one.
    pub async fn execute(&self) -> Result<Vec<JobReport>, CliError> {
        let transport = self.transport_config();
        let progress = self.output_format == OutputFormat::Human;

        let reports = match &self.command {
            Commands::Crypto(args) => args.execute(&transport, progress).await?,
            Commands::Coingecko(args) => args.execute(&transport, progress).await?,
            Commands::Stocks(args) => args.execute(&transport, progress).await?,
            Commands::Commodities(args) => args.execute(&transport, progress).await?,
        };

        print_summary(self.output_format, &reports)?;
        Ok(reports)
    }
}

impl CryptoArgs {
    async fn execute(
        &self,
        transport: &TransportConfig,
        progress: bool,
    ) -> Result<Vec<JobReport>, CliError> {
        let start = parse_start_time(&self.start_date)?;
        let end = self.end_date.as_deref().map(parse_end_time).transpose()?;
        if let Some(end) = end {
            if start >= end {
                return Err(CliError::InvalidArgument(format!(
                    "start date {} must be before end date {}",
                    self.start_date,
                    self.end_date.as_deref().unwrap_or_default()
                )));
            }
        }

        let mut config = BinanceConfig {
            page_limit: self.page_limit,
            page_delay: Duration::from_millis(self.page_delay_ms),
            ..BinanceConfig::default()
        };
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        let fetcher = BinanceKlinesFetcher::new(config, transport)?;

        let symbols = instruments_or_default(&self.symbols, DEFAULT_CRYPTO_SYMBOLS, true)?;
        let resolution = self.interval.to_string();
        let jobs = build_jobs(&symbols, &resolution, &self.data_dir, |request| {
            let request = request.with_start(start);
            match end {
                Some(end) => request.with_end(end),
                None => request,
            }
        })?;

        run_batch(&fetcher, &jobs, Duration::from_secs(self.symbol_delay_secs), progress).await
    }
}

impl CoinGeckoArgs {
    async fn execute(
        &self,
        transport: &TransportConfig,
        progress: bool,
    ) -> Result<Vec<JobReport>, CliError> {
        let mut config = CoinGeckoConfig {
            vs_currency: self.vs_currency.to_lowercase(),
            days: self.days.clone(),
            api_key: self.api_key.clone().filter(|key| !key.trim().is_empty()),
            ..CoinGeckoConfig::default()
        };
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        let fetcher = CoinGeckoFetcher::new(config, transport)?;

        let coins = instruments_or_default(&self.coins, DEFAULT_COINGECKO_COINS, false)?;
        let jobs = build_jobs(&coins, COINGECKO_RESOLUTION, &self.data_dir, |request| request)?;

        run_batch(&fetcher, &jobs, Duration::from_secs(self.symbol_delay_secs), progress).await
    }
}

impl StocksArgs {
    async fn execute(
        &self,
        transport: &TransportConfig,
        progress: bool,
    ) -> Result<Vec<JobReport>, CliError> {
        let resolution = self.function.resolution_label().ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "{} is a commodity function; use the commodities command",
                self.function
            ))
        })?;

        let mut config = self.alpha_vantage.config()?;
        config.output_size = self.output_size;
        config.allow_compact_fallback = !self.no_compact_fallback;
        let fetcher = AlphaVantageFetcher::equities(config, self.function, transport)?;

        let symbols = instruments_or_default(&self.symbols, DEFAULT_STOCK_SYMBOLS, true)?;
        let jobs = build_jobs(&symbols, resolution, &self.data_dir, |request| request)?;

        let delay = Duration::from_secs(self.alpha_vantage.symbol_delay_secs);
        run_batch(&fetcher, &jobs, delay, progress).await
    }
}

impl CommoditiesArgs {
    async fn execute(
        &self,
        transport: &TransportConfig,
        progress: bool,
    ) -> Result<Vec<JobReport>, CliError> {
        let commodities = instruments_or_default(&self.commodities, DEFAULT_COMMODITIES, true)?;
        for commodity in &commodities {
            let function =
                AlphaVantageFunction::from_str(commodity).map_err(CliError::InvalidArgument)?;
            if !function.is_commodity() {
                return Err(CliError::InvalidArgument(format!(
                    "{function} is not a commodity function"
                )));
            }
        }

        let config = self.alpha_vantage.config()?;
        let fetcher = AlphaVantageFetcher::commodities(config, transport)?;

        let interval = self.interval.to_lowercase();
        let jobs = build_jobs(&commodities, &interval, &self.data_dir, |request| request)?;

        let delay = Duration::from_secs(self.alpha_vantage.symbol_delay_secs);
        run_batch(&fetcher, &jobs, delay, progress).await
    }
}

async fn run_batch(
    fetcher: &dyn HistoricalFetcher,
    jobs: &[IngestJob],
    instrument_delay: Duration,
    progress: bool,
) -> Result<Vec<JobReport>, CliError> {
    info!(
        "Starting {} batch: {} instrument(s)",
        fetcher.provider(),
        jobs.len()
    );

    let mut executor = BatchExecutor::new(fetcher).with_instrument_delay(instrument_delay);
    if progress {
        executor = executor.with_progress(batch_progress_bar(jobs.len() as u64));
    }

    Ok(executor.run(jobs).await?)
}

fn build_jobs(
    instruments: &[String],
    resolution: &str,
    data_dir: &Path,
    customize: impl Fn(SeriesRequest) -> SeriesRequest,
) -> Result<Vec<IngestJob>, CliError> {
    instruments
        .iter()
        .map(|instrument| -> Result<IngestJob, CliError> {
            let request = customize(SeriesRequest::new(instrument.clone(), resolution));
            Ok(IngestJob::new(request, data_dir)?)
        })
        .collect()
}

/// Trim, optionally uppercase and de-duplicate instruments, falling back to `defaults`
pub fn instruments_or_default(
    given: &Option<Vec<String>>,
    defaults: &[&str],
    uppercase: bool,
) -> Result<Vec<String>, CliError> {
    let raw: Vec<String> = match given {
        Some(values) => values.clone(),
        None => defaults.iter().map(|s| s.to_string()).collect(),
    };

    let mut instruments: Vec<String> = Vec::with_capacity(raw.len());
    for value in raw {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let value = if uppercase {
            value.to_uppercase()
        } else {
            value.to_string()
        };
        if !instruments.contains(&value) {
            instruments.push(value);
        }
    }

    if instruments.is_empty() {
        return Err(CliError::InvalidArgument(
            "at least one instrument is required".to_string(),
        ));
    }
    Ok(instruments)
}

/// Parse and validate page limit
fn parse_page_limit(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("page limit must be at least 1".to_string());
    }
    if value > MAX_PAGE_LIMIT {
        return Err(format!("page limit {value} exceeds maximum of {MAX_PAGE_LIMIT}"));
    }
    Ok(value)
}

/// Try to parse datetime from RFC3339 format
///
/// Handles both inputs with and without timezone designators:
/// - "2024-01-01T00:00:00Z" - explicit UTC
/// - "2024-01-01T00:00:00+01:00" - explicit offset
/// - "2024-01-01T00:00:00" - no timezone, assumed UTC
fn try_parse_datetime_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

fn parse_boundary(input: &str, name: &str) -> Result<DateTime<Utc>, CliError> {
    let input = input.trim();
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid {name} time '{input}': {e}")))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument(format!("Invalid {name} time '{input}'")))?;
    Ok(datetime.and_utc())
}

/// Parse a start boundary from YYYY-MM-DD (start of day UTC) or RFC 3339
pub fn parse_start_time(input: &str) -> Result<DateTime<Utc>, CliError> {
    parse_boundary(input, "start")
}

/// Parse an end boundary from YYYY-MM-DD or RFC 3339
///
/// The end boundary is exclusive, so a date-only value means start of that
/// day: `--end-date 2024-01-05` stops after the 2024-01-04 daily candle.
pub fn parse_end_time(input: &str) -> Result<DateTime<Utc>, CliError> {
    parse_boundary(input, "end")
}

/// Render the human-readable run summary
pub fn format_human_summary(reports: &[JobReport]) -> String {
    let mut lines = vec![format!(
        "Ingest completed successfully: {} instrument(s)",
        reports.len()
    )];

    for report in reports {
        lines.push(format!(
            "  {} {}: {} rows -> {}",
            report.instrument,
            report.resolution,
            report.rows_written,
            report.output_path.display()
        ));
        if let Some(degradation) = &report.degradation {
            lines.push(format!("    WARNING: {degradation}"));
        }
        if report.credential_fallbacks > 0 {
            lines.push(format!(
                "    fallback API key used ({} call(s) total)",
                report.attempts
            ));
        }
    }

    let total: u64 = reports.iter().map(|r| r.rows_written).sum();
    lines.push(format!("Total rows written: {total}"));
    lines.join("\n")
}

/// Render the JSON run summary
pub fn format_json_summary(reports: &[JobReport]) -> Result<String, CliError> {
    let output = serde_json::json!({
        "success": true,
        "instruments": reports.len(),
        "rows_written": reports.iter().map(|r| r.rows_written).sum::<u64>(),
        "degraded": reports.iter().filter(|r| r.degradation.is_some()).count(),
        "jobs": reports,
    });
    Ok(serde_json::to_string(&output)?)
}

fn print_summary(format: OutputFormat, reports: &[JobReport]) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => println!("{}", format_json_summary(reports)?),
        OutputFormat::Human => println!("\n{}", format_human_summary(reports)),
    }
    Ok(())
}
