//! Unit tests for CLI argument parsing

use clap::Parser;
use market_data_ingest::cli::{Cli, Commands, OutputFormat};
use market_data_ingest::config::OutputSize;
use market_data_ingest::fetcher::alpha_vantage::AlphaVantageFunction;
use market_data_ingest::Interval;
use std::path::PathBuf;

#[test]
fn test_crypto_defaults() {
    let cli = Cli::try_parse_from(["market-data-ingest", "crypto"]).unwrap();
    assert_eq!(cli.max_retries, 5);
    assert_eq!(cli.output_format, OutputFormat::Human);

    let Commands::Crypto(args) = cli.command else {
        panic!("expected crypto command");
    };
    assert_eq!(args.symbols, None);
    assert_eq!(args.interval, Interval::OneDay);
    assert_eq!(args.start_date, "2017-08-01");
    assert_eq!(args.page_limit, 1000);
    assert_eq!(args.page_delay_ms, 200);
    assert_eq!(args.data_dir, PathBuf::from("data/raw/crypto"));
}

#[test]
fn test_crypto_flags() {
    let cli = Cli::try_parse_from([
        "market-data-ingest",
        "crypto",
        "--symbols",
        "BTCUSDT,SOLUSDT",
        "--interval",
        "4h",
        "--end-date",
        "2024-01-05",
        "--page-limit",
        "500",
        "--output-format",
        "json",
        "--max-retries",
        "3",
    ])
    .unwrap();

    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.max_retries, 3);
    let Commands::Crypto(args) = cli.command else {
        panic!("expected crypto command");
    };
    assert_eq!(
        args.symbols,
        Some(vec!["BTCUSDT".to_string(), "SOLUSDT".to_string()])
    );
    assert_eq!(args.interval, Interval::FourHours);
    assert_eq!(args.end_date.as_deref(), Some("2024-01-05"));
    assert_eq!(args.page_limit, 500);
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(Cli::try_parse_from(["market-data-ingest", "crypto", "--interval", "7d"]).is_err());
    assert!(Cli::try_parse_from(["market-data-ingest", "crypto", "--page-limit", "5000"]).is_err());
    assert!(Cli::try_parse_from(["market-data-ingest", "crypto", "--max-retries", "50"]).is_err());
    assert!(Cli::try_parse_from([
        "market-data-ingest",
        "stocks",
        "--function",
        "TIME_SERIES_HOURLY"
    ])
    .is_err());
}

#[test]
fn test_stocks_flags() {
    let cli = Cli::try_parse_from([
        "market-data-ingest",
        "stocks",
        "--symbols",
        "AAPL",
        "--function",
        "TIME_SERIES_WEEKLY",
        "--output-size",
        "compact",
        "--api-key",
        "PRIMARY",
        "--fallback-api-key",
        "SECONDARY",
        "--retry-ceiling",
        "4",
    ])
    .unwrap();

    let Commands::Stocks(args) = cli.command else {
        panic!("expected stocks command");
    };
    assert_eq!(args.function, AlphaVantageFunction::TimeSeriesWeekly);
    assert_eq!(args.output_size, OutputSize::Compact);
    assert_eq!(args.alpha_vantage.api_key.as_deref(), Some("PRIMARY"));
    assert_eq!(args.alpha_vantage.fallback_api_key.as_deref(), Some("SECONDARY"));
    assert_eq!(args.alpha_vantage.retry_ceiling, 4);
    assert_eq!(args.alpha_vantage.symbol_delay_secs, 15);
    assert_eq!(args.data_dir, PathBuf::from("data/raw/stocks"));
}

#[test]
fn test_commodities_defaults() {
    let cli =
        Cli::try_parse_from(["market-data-ingest", "commodities", "--api-key", "KEY"]).unwrap();
    let Commands::Commodities(args) = cli.command else {
        panic!("expected commodities command");
    };
    assert_eq!(args.interval, "monthly");
    assert_eq!(args.commodities, None);
    assert_eq!(args.data_dir, PathBuf::from("data/raw/commodities"));
}
