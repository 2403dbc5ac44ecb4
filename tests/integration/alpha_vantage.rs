//! Alpha Vantage equity and commodity ingest against a mock server

use market_data_ingest::config::{AlphaVantageConfig, Credentials, OutputSize, TransportConfig};
use market_data_ingest::downloader::{BatchExecutor, IngestJob};
use market_data_ingest::fetcher::alpha_vantage::{AlphaVantageFetcher, AlphaVantageFunction};
use market_data_ingest::fetcher::{FetcherError, HistoricalFetcher, SeriesRequest};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THROTTLE_NOTE: &str = "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute and 500 calls per day.";
const PREMIUM_OUTPUT: &str = "Thank you for using Alpha Vantage! The outputsize=full parameter value is a premium feature for the TIME_SERIES_DAILY_ADJUSTED endpoint. You may subscribe to any of the premium plans at https://www.alphavantage.co/premium/ to instantly unlock all premium features";

fn fast_transport() -> TransportConfig {
    TransportConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        ..TransportConfig::default()
    }
}

fn config(server: &MockServer, fallback: Option<&str>) -> AlphaVantageConfig {
    let credentials =
        Credentials::new(Some("PRIMARY".to_string()), fallback.map(str::to_string)).unwrap();
    AlphaVantageConfig {
        base_url: server.uri(),
        retry_delay: Duration::from_millis(1),
        ..AlphaVantageConfig::new(credentials)
    }
}

fn equities(config: AlphaVantageConfig) -> AlphaVantageFetcher {
    AlphaVantageFetcher::equities(
        config,
        AlphaVantageFunction::TimeSeriesDailyAdjusted,
        &fast_transport(),
    )
    .unwrap()
}

fn daily_adjusted() -> Value {
    json!({
        "Meta Data": {
            "1. Information": "Daily Time Series with Splits and Dividend Events",
            "2. Symbol": "IBM",
            "3. Last Refreshed": "2024-01-05",
            "4. Output Size": "Full size",
            "5. Time Zone": "US/Eastern"
        },
        "Time Series (Daily)": {
            "2024-01-05": {
                "1. open": "160.9", "2. high": "161.36", "3. low": "159.78", "4. close": "159.16",
                "5. adjusted close": "155.64", "6. volume": "3816992",
                "7. dividend amount": "0.0000", "8. split coefficient": "1.0"
            },
            "2024-01-04": {
                "1. open": "161.0", "2. high": "161.09", "3. low": "160.05", "4. close": "160.1",
                "5. adjusted close": "156.56", "6. volume": "4210426",
                "7. dividend amount": "0.0000", "8. split coefficient": "1.0"
            },
            "2024-01-03": {
                "1. open": "161.0", "2. high": "161.73", "3. low": "160.08", "4. close": "160.1",
                "5. adjusted close": "156.56", "6. volume": "4086058",
                "7. dividend amount": "0.0000", "8. split coefficient": "1.0"
            }
        }
    })
}

#[tokio::test]
async fn test_daily_adjusted_series_is_written_ascending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "TIME_SERIES_DAILY_ADJUSTED"))
        .and(query_param("symbol", "IBM"))
        .and(query_param("outputsize", "full"))
        .and(query_param("apikey", "PRIMARY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_adjusted()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher = equities(config(&server, None));
    let job = IngestJob::new(SeriesRequest::new("IBM", "daily"), dir.path()).unwrap();

    let reports = BatchExecutor::new(&fetcher).run(&[job]).await.unwrap();
    assert_eq!(reports[0].rows_written, 3);
    assert_eq!(reports[0].provider, "alphavantage");
    assert_eq!(reports[0].degradation, None);

    let content = std::fs::read_to_string(dir.path().join("IBM_daily.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "symbol,date,open,high,low,close,adjusted_close,volume");
    assert_eq!(lines[1], "IBM,2024-01-03,161.0,161.73,160.08,160.1,156.56,4086058");
    assert!(lines[3].starts_with("IBM,2024-01-05,"));
}

#[tokio::test]
async fn test_throttled_primary_key_falls_back_to_secondary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("apikey", "PRIMARY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Note": THROTTLE_NOTE })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("apikey", "SECONDARY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_adjusted()))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = equities(config(&server, Some("SECONDARY")))
        .fetch(&SeriesRequest::new("IBM", "daily"))
        .await
        .unwrap();

    assert_eq!(fetched.attempts, 2);
    assert_eq!(fetched.credential_fallbacks, 1);
    assert_eq!(fetched.raw.len(), 3);
}

#[tokio::test]
async fn test_premium_full_output_downgrades_to_compact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("outputsize", "full"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Information": PREMIUM_OUTPUT })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("outputsize", "compact"))
        .and(query_param("apikey", "PRIMARY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_adjusted()))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = equities(config(&server, Some("SECONDARY")))
        .fetch(&SeriesRequest::new("IBM", "daily"))
        .await
        .unwrap();

    assert_eq!(fetched.attempts, 2);
    assert_eq!(fetched.credential_fallbacks, 0);
    let degradation = fetched.degradation.unwrap();
    assert!(degradation.contains("compact"));
}

#[tokio::test]
async fn test_premium_output_without_compact_fallback_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Information": PREMIUM_OUTPUT })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = AlphaVantageConfig {
        allow_compact_fallback: false,
        output_size: OutputSize::Full,
        ..config(&server, None)
    };
    let err = equities(config)
        .fetch(&SeriesRequest::new("IBM", "daily"))
        .await
        .unwrap_err();

    match err {
        FetcherError::RateLimited { advisory } => assert!(advisory.contains("premium")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_persistent_throttling_stops_at_retry_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Note": THROTTLE_NOTE })))
        .expect(3)
        .mount(&server)
        .await;

    let err = equities(config(&server, None))
        .fetch(&SeriesRequest::new("IBM", "daily"))
        .await
        .unwrap_err();

    match err {
        FetcherError::RateLimited { advisory } => assert_eq!(advisory, THROTTLE_NOTE),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_series_key_reports_payload() {
    let server = MockServer::start().await;
    let body = json!({
        "Error Message": "Invalid API call. Please retry or visit the documentation (https://www.alphavantage.co/documentation/) for TIME_SERIES_DAILY_ADJUSTED."
    });
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let err = equities(config(&server, Some("SECONDARY")))
        .fetch(&SeriesRequest::new("NOPE", "daily"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::SchemaMismatch { .. }));
    assert!(err.to_string().contains("Time Series (Daily)"));
    assert_eq!(err.payload(), Some(body.to_string().as_str()));
}

#[tokio::test]
async fn test_commodity_skips_missing_observations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "WTI"))
        .and(query_param("interval", "monthly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Crude Oil Prices WTI",
            "interval": "monthly",
            "unit": "dollars per barrel",
            "data": [
                { "date": "2024-02-01", "value": "77.25" },
                { "date": "2024-01-01", "value": "." },
                { "date": "2023-12-01", "value": "71.9" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher =
        AlphaVantageFetcher::commodities(config(&server, None), &fast_transport()).unwrap();
    let job = IngestJob::new(SeriesRequest::new("WTI", "monthly"), dir.path()).unwrap();

    let reports = BatchExecutor::new(&fetcher).run(&[job]).await.unwrap();
    assert_eq!(reports[0].rows_written, 2);

    let content = std::fs::read_to_string(dir.path().join("WTI_monthly.csv")).unwrap();
    assert_eq!(content, "date,value\n2023-12-01,71.9\n2024-02-01,77.25\n");
}

#[tokio::test]
async fn test_commodity_rejects_unknown_interval_without_calling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher =
        AlphaVantageFetcher::commodities(config(&server, None), &fast_transport()).unwrap();
    let err = fetcher
        .fetch(&SeriesRequest::new("BRENT", "hourly"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetcherError::Configuration(_)));
}
