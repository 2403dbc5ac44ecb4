//! CoinGecko market chart fetcher

use async_trait::async_trait;
use tracing::debug;

use super::http::HttpClient;
use super::{FetchedSeries, FetcherError, FetcherResult, HistoricalFetcher, SeriesRequest};
use crate::config::{CoinGeckoConfig, TransportConfig};
use crate::normalize::{RawMarketChart, RawSeries};

/// Key that must be present in a market chart response
const PRICES_KEY: &str = "prices";

/// Resolution of every series this fetcher returns
pub const COINGECKO_RESOLUTION: &str = "daily";

/// Daily price, market cap and volume history for a coin id
pub struct CoinGeckoFetcher {
    http_client: HttpClient,
    config: CoinGeckoConfig,
}

impl CoinGeckoFetcher {
    /// Create a fetcher
    ///
    /// # Errors
    /// Returns [`FetcherError::Configuration`] if the HTTP client cannot be built
    pub fn new(config: CoinGeckoConfig, transport: &TransportConfig) -> FetcherResult<Self> {
        let http_client = HttpClient::new(config.base_url.clone(), transport)?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl HistoricalFetcher for CoinGeckoFetcher {
    fn provider(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, request: &SeriesRequest) -> FetcherResult<FetchedSeries> {
        let coin_id = request.instrument.trim().to_lowercase();
        if coin_id.is_empty() || coin_id.contains('/') {
            return Err(FetcherError::Configuration(format!(
                "Invalid CoinGecko coin id: '{}'",
                request.instrument
            )));
        }

        let endpoint = format!("/coins/{coin_id}/market_chart");
        let mut params = vec![
            ("vs_currency", self.config.vs_currency.clone()),
            ("days", self.config.days.clone()),
            ("interval", COINGECKO_RESOLUTION.to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("x_cg_demo_api_key", key.clone()));
        }

        let body = self.http_client.get_json(&endpoint, &params).await?;
        if body.get(PRICES_KEY).is_none() {
            return Err(FetcherError::schema_mismatch(
                format!("missing '{PRICES_KEY}' for {coin_id}"),
                &body,
            ));
        }

        let chart: RawMarketChart = serde_json::from_value(body.clone()).map_err(|e| {
            FetcherError::schema_mismatch(format!("unexpected market chart shape: {e}"), &body)
        })?;
        if chart.prices.is_empty() {
            return Err(FetcherError::EmptyResult {
                instrument: coin_id,
            });
        }

        debug!("Fetched {} price points for {}", chart.prices.len(), coin_id);
        Ok(FetchedSeries::complete(RawSeries::MarketChart(chart)))
    }
}
