//! Batch execution: ordering, overwrite, abort on failure and summaries

use market_data_ingest::cli::ingest::{format_human_summary, format_json_summary};
use market_data_ingest::config::{CoinGeckoConfig, TransportConfig};
use market_data_ingest::downloader::{BatchExecutor, DownloadError, IngestJob};
use market_data_ingest::fetcher::coingecko::{CoinGeckoFetcher, COINGECKO_RESOLUTION};
use market_data_ingest::fetcher::{FetcherError, SeriesRequest};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(server: &MockServer) -> CoinGeckoFetcher {
    let config = CoinGeckoConfig {
        base_url: server.uri(),
        ..CoinGeckoConfig::default()
    };
    let transport = TransportConfig {
        max_retries: 0,
        ..TransportConfig::default()
    };
    CoinGeckoFetcher::new(config, &transport).unwrap()
}

fn chart(prices: &[(i64, f64)]) -> Value {
    let prices: Vec<Value> = prices.iter().map(|(ts, p)| json!([ts, p])).collect();
    json!({ "prices": prices, "market_caps": [], "total_volumes": [] })
}

async fn mount_chart(server: &MockServer, coin: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/coins/{coin}/market_chart")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn jobs(coins: &[&str], dir: &Path) -> Vec<IngestJob> {
    coins
        .iter()
        .map(|coin| IngestJob::new(SeriesRequest::new(*coin, COINGECKO_RESOLUTION), dir).unwrap())
        .collect()
}

#[tokio::test]
async fn test_batch_writes_one_file_per_instrument_in_order() {
    let server = MockServer::start().await;
    let bitcoin = chart(&[(1704067200000, 42265.5), (1704153600000, 44187.25)]);
    mount_chart(&server, "bitcoin", bitcoin).await;
    mount_chart(&server, "ethereum", chart(&[(1704067200000, 2281.5)])).await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(&server);
    let reports = BatchExecutor::new(&fetcher)
        .with_instrument_delay(Duration::from_millis(1))
        .run(&jobs(&["bitcoin", "ethereum"], dir.path()))
        .await
        .unwrap();

    let instruments: Vec<&str> = reports.iter().map(|r| r.instrument.as_str()).collect();
    assert_eq!(instruments, vec!["bitcoin", "ethereum"]);
    assert_eq!(reports[0].rows_written, 2);
    assert_eq!(reports[1].rows_written, 1);
    assert!(dir.path().join("bitcoin_daily.csv").exists());
    assert!(dir.path().join("ethereum_daily.csv").exists());

    let human = format_human_summary(&reports);
    assert!(human.starts_with("Ingest completed successfully: 2 instrument(s)"));
    assert!(human.ends_with("Total rows written: 3"));

    let summary: Value = serde_json::from_str(&format_json_summary(&reports).unwrap()).unwrap();
    assert_eq!(summary["success"], json!(true));
    assert_eq!(summary["rows_written"], json!(3));
    assert_eq!(summary["jobs"][1]["instrument"], json!("ethereum"));
    assert!(summary["jobs"][0].get("degradation").is_none());
}

#[tokio::test]
async fn test_rerun_replaces_previous_output() {
    let dir = tempfile::tempdir().unwrap();

    let first = MockServer::start().await;
    let three_days = chart(&[
        (1704067200000, 1.0),
        (1704153600000, 2.0),
        (1704240000000, 3.0),
    ]);
    mount_chart(&first, "bitcoin", three_days).await;
    BatchExecutor::new(&fetcher(&first))
        .run(&jobs(&["bitcoin"], dir.path()))
        .await
        .unwrap();

    let second = MockServer::start().await;
    mount_chart(&second, "bitcoin", chart(&[(1704067200000, 10.0)])).await;
    let reports = BatchExecutor::new(&fetcher(&second))
        .run(&jobs(&["bitcoin"], dir.path()))
        .await
        .unwrap();
    assert_eq!(reports[0].rows_written, 1);

    let content = std::fs::read_to_string(dir.path().join("bitcoin_daily.csv")).unwrap();
    assert_eq!(
        content,
        "timestamp,price,market_cap,total_volume\n2024-01-01T00:00:00.000Z,10.0,,\n"
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_failure_aborts_remaining_instruments() {
    let server = MockServer::start().await;
    mount_chart(&server, "bitcoin", chart(&[(1704067200000, 42265.5)])).await;
    mount_chart(&server, "dogecoin", chart(&[])).await;
    Mock::given(method("GET"))
        .and(path("/coins/ethereum/market_chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart(&[(1704067200000, 2281.5)])))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(&server);
    let err = BatchExecutor::new(&fetcher)
        .run(&jobs(&["bitcoin", "dogecoin", "ethereum"], dir.path()))
        .await
        .unwrap_err();

    match err {
        DownloadError::Fetcher(FetcherError::EmptyResult { instrument }) => {
            assert_eq!(instrument, "dogecoin")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dir.path().join("bitcoin_daily.csv").exists());
    assert!(!dir.path().join("dogecoin_daily.csv").exists());
    assert!(!dir.path().join("ethereum_daily.csv").exists());
}
