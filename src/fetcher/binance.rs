//! Binance spot klines fetcher
//!
//! Pages through `/api/v3/klines` with [`PaginationHelper`], starting at the
//! requested start time and advancing past the last close time of each page.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use super::http::HttpClient;
use super::pagination::{CursorRecord, PageQuery, PaginationHelper, PaginationSettings};
use super::{FetchedSeries, FetcherError, FetcherResult, HistoricalFetcher, SeriesRequest};
use crate::config::{BinanceConfig, TransportConfig};
use crate::normalize::{RawKline, RawSeries};
use crate::Interval;

impl CursorRecord for RawKline {
    fn start_time_ms(&self) -> i64 {
        self.open_time
    }

    fn end_time_ms(&self) -> i64 {
        self.close_time
    }
}

/// Estimate the number of candles in `[start_time, end_time)`
pub fn calculate_total_bars(start_time: i64, end_time: i64, interval_ms: i64) -> u64 {
    if end_time <= start_time || interval_ms <= 0 {
        return 0;
    }
    let duration = end_time - start_time;
    ((duration + interval_ms - 1) / interval_ms) as u64
}

/// Paginated kline fetcher
pub struct BinanceKlinesFetcher {
    http_client: HttpClient,
    config: BinanceConfig,
}

impl BinanceKlinesFetcher {
    /// Create a fetcher
    ///
    /// # Errors
    /// Returns [`FetcherError::Configuration`] if the HTTP client cannot be built
    pub fn new(config: BinanceConfig, transport: &TransportConfig) -> FetcherResult<Self> {
        let http_client = HttpClient::new(config.base_url.clone(), transport)?;
        Ok(Self {
            http_client,
            config,
        })
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        interval: Interval,
        query: PageQuery,
    ) -> FetcherResult<Vec<RawKline>> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", query.limit.to_string()),
            ("startTime", query.cursor.to_string()),
        ];
        if let Some(end) = query.end_time {
            params.push(("endTime", end.to_string()));
        }

        let body = self
            .http_client
            .get_json(&self.config.klines_endpoint, &params)
            .await?;

        Vec::<RawKline>::deserialize(&body).map_err(|e| {
            FetcherError::schema_mismatch(
                format!("expected an array of 12-field klines: {e}"),
                &body,
            )
        })
    }
}

#[async_trait]
impl HistoricalFetcher for BinanceKlinesFetcher {
    fn provider(&self) -> &'static str {
        "binance"
    }

    async fn fetch(&self, request: &SeriesRequest) -> FetcherResult<FetchedSeries> {
        let interval =
            Interval::from_str(&request.resolution).map_err(FetcherError::Configuration)?;
        let symbol = request.instrument.to_uppercase();
        let start_time = request.start.map_or(0, |start| start.timestamp_millis());
        let end_time = request.end.map(|end| end.timestamp_millis());

        if let Some(end) = end_time {
            if end <= start_time {
                return Err(FetcherError::Configuration(format!(
                    "end boundary must be after start boundary for {symbol}"
                )));
            }
        }

        let estimate_end = end_time.unwrap_or_else(|| Utc::now().timestamp_millis());
        let estimated_bars =
            calculate_total_bars(start_time, estimate_end, interval.to_milliseconds());
        let estimated_pages = estimated_bars.div_ceil(self.config.page_limit.max(1) as u64);
        info!(
            "Fetching {} {} klines (~{} bars, ~{} pages)",
            symbol, interval, estimated_bars, estimated_pages
        );

        let settings = PaginationSettings::new(self.config.page_limit, self.config.page_delay);
        let mut pages = 0u32;
        let klines = PaginationHelper::paginate(&symbol, start_time, end_time, &settings, |query| {
            pages += 1;
            self.fetch_page(&symbol, interval, query)
        })
        .await?;

        debug!("Fetched {} klines for {} in {} pages", klines.len(), symbol, pages);
        Ok(FetchedSeries {
            attempts: pages,
            ..FetchedSeries::complete(RawSeries::Klines(klines))
        })
    }
}
