//! Binance klines ingest against a mock server

use chrono::{TimeZone, Utc};
use market_data_ingest::config::{BinanceConfig, TransportConfig};
use market_data_ingest::downloader::{BatchExecutor, DownloadError, IngestJob};
use market_data_ingest::fetcher::binance::BinanceKlinesFetcher;
use market_data_ingest::fetcher::{FetcherError, HistoricalFetcher, SeriesRequest};
use market_data_ingest::normalize::RawSeries;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DAY_MS: i64 = 86_400_000;
const JAN_1: i64 = 1_704_067_200_000;
const JAN_5: i64 = 1_704_412_800_000;

fn fast_transport() -> TransportConfig {
    TransportConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        ..TransportConfig::default()
    }
}

fn fetcher(server: &MockServer, page_limit: usize) -> BinanceKlinesFetcher {
    let config = BinanceConfig {
        base_url: server.uri(),
        page_limit,
        page_delay: Duration::ZERO,
        ..BinanceConfig::default()
    };
    BinanceKlinesFetcher::new(config, &fast_transport()).unwrap()
}

/// Daily kline in Binance's 12-element array format
fn kline(day: i64) -> Value {
    let open_time = JAN_1 + day * DAY_MS;
    json!([
        open_time,
        "42283.58000000",
        "44184.10000000",
        "42180.77000000",
        "44179.55000000",
        "27174.29903000",
        open_time + DAY_MS - 1,
        "1169996318.81435010",
        1_048_298,
        "13932.70084000",
        "599910329.25498650",
        "0"
    ])
}

fn klines(days: std::ops::Range<i64>) -> Value {
    Value::Array(days.map(kline).collect())
}

fn request() -> SeriesRequest {
    SeriesRequest::new("BTCUSDT", "1d")
        .with_start(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_end(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
}

#[tokio::test]
async fn test_four_day_range_writes_four_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("interval", "1d"))
        .and(query_param("startTime", JAN_1.to_string()))
        .and(query_param("endTime", JAN_5.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(0..4)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(&server, 1000);
    let job = IngestJob::new(request(), dir.path()).unwrap();

    let reports = BatchExecutor::new(&fetcher).run(&[job]).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].rows_written, 4);
    assert_eq!(reports[0].provider, "binance");
    assert_eq!(reports[0].attempts, 1);

    let content = std::fs::read_to_string(dir.path().join("BTCUSDT_1d.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("open_time,open,high,low,close,volume,close_time"));
    assert!(lines[1].starts_with("2024-01-01T00:00:00.000Z,42283.58"));
    assert!(lines[4].starts_with("2024-01-04T00:00:00.000Z"));
}

#[tokio::test]
async fn test_full_page_requests_next_page_from_last_close() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("startTime", JAN_1.to_string()))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(0..2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("startTime", (JAN_1 + 2 * DAY_MS).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(2..4)))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = fetcher(&server, 2).fetch(&request()).await.unwrap();
    assert_eq!(fetched.attempts, 2);
    let RawSeries::Klines(rows) = fetched.raw else {
        panic!("expected klines");
    };
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3].open_time, JAN_1 + 3 * DAY_MS);
}

#[tokio::test]
async fn test_records_past_end_boundary_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(0..6)))
        .mount(&server)
        .await;

    let fetched = fetcher(&server, 1000).fetch(&request()).await.unwrap();
    assert_eq!(fetched.raw.len(), 4);
}

#[tokio::test]
async fn test_empty_range_is_empty_result_and_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(&server, 1000);
    let job = IngestJob::new(request(), dir.path()).unwrap();

    let err = BatchExecutor::new(&fetcher).run(&[job]).await.unwrap_err();
    assert!(matches!(
        err,
        DownloadError::Fetcher(FetcherError::EmptyResult { .. })
    ));
    assert!(!dir.path().join("BTCUSDT_1d.csv").exists());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(0..4)))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let fetched = fetcher(&server, 1000).fetch(&request()).await.unwrap();
    assert_eq!(fetched.raw.len(), 4);
    assert_eq!(fetched.attempts, 1);
}

#[tokio::test]
async fn test_persistent_server_error_becomes_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = fetcher(&server, 1000).fetch(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        FetcherError::Transport {
            status: Some(502),
            ..
        }
    ));
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher(&server, 1000).fetch(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        FetcherError::Transport {
            status: Some(400),
            ..
        }
    ));
    assert!(err.to_string().contains("Invalid symbol"));
}

#[tokio::test]
async fn test_non_array_body_is_schema_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let err = fetcher(&server, 1000).fetch(&request()).await.unwrap_err();
    assert!(matches!(err, FetcherError::SchemaMismatch { .. }));
    assert_eq!(err.payload(), Some(r#"{"unexpected":true}"#));
}
