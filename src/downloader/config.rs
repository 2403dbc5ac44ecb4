//! Ingestion defaults

/// Maximum number of transport retries for failed requests.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Klines per Binance page (endpoint maximum).
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Pause between Binance pages in milliseconds.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 200;

/// Upper bound on pages fetched for one instrument.
pub const MAX_PAGE_ITERATIONS: usize = 10_000;

/// Pause between Alpha Vantage instruments. The free tier allows 5 calls per minute.
pub const DEFAULT_ALPHA_VANTAGE_SYMBOL_DELAY_SECS: u64 = 15;

/// Calls per Alpha Vantage instrument before a throttling advisory becomes fatal.
pub const DEFAULT_ALPHA_VANTAGE_RETRY_CEILING: u32 = 3;

/// Wait before retrying a throttled Alpha Vantage call.
pub const DEFAULT_ALPHA_VANTAGE_RETRY_DELAY_SECS: u64 = 60;

/// Pause between CoinGecko instruments (public tier allows roughly 5-15 calls per minute).
pub const DEFAULT_COINGECKO_SYMBOL_DELAY_SECS: u64 = 6;

/// Default Binance symbols
pub const DEFAULT_CRYPTO_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT"];

/// Default Binance interval
pub const DEFAULT_CRYPTO_INTERVAL: &str = "1d";

/// Default start of Binance history (first day of Binance spot klines)
pub const DEFAULT_CRYPTO_START_DATE: &str = "2017-08-01";

/// Default CoinGecko coin ids
pub const DEFAULT_COINGECKO_COINS: &[&str] = &["bitcoin", "ethereum"];

/// Default equity symbols
pub const DEFAULT_STOCK_SYMBOLS: &[&str] = &["AAPL", "MSFT", "TSLA"];

/// Default commodity functions
pub const DEFAULT_COMMODITIES: &[&str] = &["WTI", "BRENT", "NATURAL_GAS"];

/// Default output directory for crypto data
pub const DEFAULT_CRYPTO_DATA_DIR: &str = "data/raw/crypto";

/// Default output directory for equity data
pub const DEFAULT_STOCKS_DATA_DIR: &str = "data/raw/stocks";

/// Default output directory for commodity data
pub const DEFAULT_COMMODITIES_DATA_DIR: &str = "data/raw/commodities";
