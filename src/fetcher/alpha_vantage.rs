//! Alpha Vantage equity and commodity fetcher
//!
//! One call per instrument, no pagination. Responses without the expected
//! data key are inspected for advisories and handed to [`AdvisoryRetry`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::advisory::{Advisory, AdvisoryDecision, AdvisoryRetry, AdvisoryRetryPolicy};
use super::http::HttpClient;
use super::{FetchedSeries, FetcherError, FetcherResult, HistoricalFetcher, SeriesRequest};
use crate::config::{AlphaVantageConfig, OutputSize, TransportConfig};
use crate::normalize::{RawObservation, RawSeries};

/// Intervals accepted by the commodity functions
pub const COMMODITY_INTERVALS: &[&str] = &["daily", "weekly", "monthly", "quarterly", "annual"];

/// Alpha Vantage `function` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaVantageFunction {
    /// `TIME_SERIES_DAILY`
    TimeSeriesDaily,
    /// `TIME_SERIES_DAILY_ADJUSTED`
    TimeSeriesDailyAdjusted,
    /// `TIME_SERIES_WEEKLY`
    TimeSeriesWeekly,
    /// `TIME_SERIES_WEEKLY_ADJUSTED`
    TimeSeriesWeeklyAdjusted,
    /// `TIME_SERIES_MONTHLY`
    TimeSeriesMonthly,
    /// `TIME_SERIES_MONTHLY_ADJUSTED`
    TimeSeriesMonthlyAdjusted,
    /// West Texas Intermediate crude
    Wti,
    /// Brent crude
    Brent,
    /// Henry Hub natural gas
    NaturalGas,
    /// Global copper price
    Copper,
    /// Global aluminum price
    Aluminum,
    /// Global wheat price
    Wheat,
    /// Global corn price
    Corn,
    /// Global cotton price
    Cotton,
    /// Global sugar price
    Sugar,
    /// Global coffee price
    Coffee,
    /// Global commodities index
    AllCommodities,
}

impl AlphaVantageFunction {
    /// Top-level key holding the data in a successful response
    pub fn expected_key(&self) -> &'static str {
        match self {
            Self::TimeSeriesDaily | Self::TimeSeriesDailyAdjusted => "Time Series (Daily)",
            Self::TimeSeriesWeekly => "Weekly Time Series",
            Self::TimeSeriesWeeklyAdjusted => "Weekly Adjusted Time Series",
            Self::TimeSeriesMonthly => "Monthly Time Series",
            Self::TimeSeriesMonthlyAdjusted => "Monthly Adjusted Time Series",
            _ => "data",
        }
    }

    /// Resolution label for equity functions; commodities take theirs from the request
    pub fn resolution_label(&self) -> Option<&'static str> {
        match self {
            Self::TimeSeriesDaily | Self::TimeSeriesDailyAdjusted => Some("daily"),
            Self::TimeSeriesWeekly | Self::TimeSeriesWeeklyAdjusted => Some("weekly"),
            Self::TimeSeriesMonthly | Self::TimeSeriesMonthlyAdjusted => Some("monthly"),
            _ => None,
        }
    }

    /// Whether rows carry an adjusted close
    pub fn is_adjusted(&self) -> bool {
        matches!(
            self,
            Self::TimeSeriesDailyAdjusted
                | Self::TimeSeriesWeeklyAdjusted
                | Self::TimeSeriesMonthlyAdjusted
        )
    }

    /// Whether the function takes an `outputsize` parameter
    pub fn accepts_outputsize(&self) -> bool {
        matches!(self, Self::TimeSeriesDaily | Self::TimeSeriesDailyAdjusted)
    }

    /// Whether this is a commodity function
    pub fn is_commodity(&self) -> bool {
        self.resolution_label().is_none()
    }
}

impl fmt::Display for AlphaVantageFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TimeSeriesDaily => "TIME_SERIES_DAILY",
            Self::TimeSeriesDailyAdjusted => "TIME_SERIES_DAILY_ADJUSTED",
            Self::TimeSeriesWeekly => "TIME_SERIES_WEEKLY",
            Self::TimeSeriesWeeklyAdjusted => "TIME_SERIES_WEEKLY_ADJUSTED",
            Self::TimeSeriesMonthly => "TIME_SERIES_MONTHLY",
            Self::TimeSeriesMonthlyAdjusted => "TIME_SERIES_MONTHLY_ADJUSTED",
            Self::Wti => "WTI",
            Self::Brent => "BRENT",
            Self::NaturalGas => "NATURAL_GAS",
            Self::Copper => "COPPER",
            Self::Aluminum => "ALUMINUM",
            Self::Wheat => "WHEAT",
            Self::Corn => "CORN",
            Self::Cotton => "COTTON",
            Self::Sugar => "SUGAR",
            Self::Coffee => "COFFEE",
            Self::AllCommodities => "ALL_COMMODITIES",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AlphaVantageFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TIME_SERIES_DAILY" => Ok(Self::TimeSeriesDaily),
            "TIME_SERIES_DAILY_ADJUSTED" => Ok(Self::TimeSeriesDailyAdjusted),
            "TIME_SERIES_WEEKLY" => Ok(Self::TimeSeriesWeekly),
            "TIME_SERIES_WEEKLY_ADJUSTED" => Ok(Self::TimeSeriesWeeklyAdjusted),
            "TIME_SERIES_MONTHLY" => Ok(Self::TimeSeriesMonthly),
            "TIME_SERIES_MONTHLY_ADJUSTED" => Ok(Self::TimeSeriesMonthlyAdjusted),
            "WTI" => Ok(Self::Wti),
            "BRENT" => Ok(Self::Brent),
            "NATURAL_GAS" => Ok(Self::NaturalGas),
            "COPPER" => Ok(Self::Copper),
            "ALUMINUM" => Ok(Self::Aluminum),
            "WHEAT" => Ok(Self::Wheat),
            "CORN" => Ok(Self::Corn),
            "COTTON" => Ok(Self::Cotton),
            "SUGAR" => Ok(Self::Sugar),
            "COFFEE" => Ok(Self::Coffee),
            "ALL_COMMODITIES" => Ok(Self::AllCommodities),
            _ => Err(format!("Unsupported Alpha Vantage function: {s}")),
        }
    }
}

/// Alpha Vantage fetcher
///
/// Built either for one equity function (instruments are ticker symbols) or
/// for commodities (instruments are commodity function names and the request
/// resolution is the `interval` parameter).
pub struct AlphaVantageFetcher {
    http_client: HttpClient,
    config: AlphaVantageConfig,
    equity_function: Option<AlphaVantageFunction>,
}

impl AlphaVantageFetcher {
    /// Fetcher for an equity time series function
    ///
    /// # Errors
    /// [`FetcherError::Configuration`] if `function` is a commodity function
    /// or the HTTP client cannot be built
    pub fn equities(
        config: AlphaVantageConfig,
        function: AlphaVantageFunction,
        transport: &TransportConfig,
    ) -> FetcherResult<Self> {
        if function.is_commodity() {
            return Err(FetcherError::Configuration(format!(
                "{function} is a commodity function, not an equity time series"
            )));
        }
        Self::build(config, Some(function), transport)
    }

    /// Fetcher for commodity functions
    ///
    /// # Errors
    /// [`FetcherError::Configuration`] if the HTTP client cannot be built
    pub fn commodities(
        config: AlphaVantageConfig,
        transport: &TransportConfig,
    ) -> FetcherResult<Self> {
        Self::build(config, None, transport)
    }

    fn build(
        config: AlphaVantageConfig,
        equity_function: Option<AlphaVantageFunction>,
        transport: &TransportConfig,
    ) -> FetcherResult<Self> {
        let http_client = HttpClient::new(config.base_url.clone(), transport)?;
        Ok(Self {
            http_client,
            config,
            equity_function,
        })
    }

    fn resolve_function(&self, request: &SeriesRequest) -> FetcherResult<AlphaVantageFunction> {
        if let Some(function) = self.equity_function {
            return Ok(function);
        }

        let function =
            AlphaVantageFunction::from_str(&request.instrument)
                .map_err(FetcherError::Configuration)?;
        if !function.is_commodity() {
            return Err(FetcherError::Configuration(format!(
                "{function} is not a commodity function"
            )));
        }
        if !COMMODITY_INTERVALS.contains(&request.resolution.as_str()) {
            return Err(FetcherError::Configuration(format!(
                "Invalid commodity interval: {}. Valid options: {}",
                request.resolution,
                COMMODITY_INTERVALS.join(", ")
            )));
        }
        Ok(function)
    }

    fn query_params(
        function: AlphaVantageFunction,
        request: &SeriesRequest,
        output_size: OutputSize,
        api_key: &str,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![("function", function.to_string())];
        if function.is_commodity() {
            params.push(("interval", request.resolution.clone()));
        } else {
            params.push(("symbol", request.instrument.clone()));
            if function.accepts_outputsize() {
                params.push(("outputsize", output_size.to_string()));
            }
        }
        params.push(("datatype", "json".to_string()));
        params.push(("apikey", api_key.to_string()));
        params
    }

    fn parse_payload(
        function: AlphaVantageFunction,
        instrument: &str,
        data: &Value,
        body: &Value,
    ) -> FetcherResult<RawSeries> {
        if function.is_commodity() {
            let observations = Vec::<RawObservation>::deserialize(data).map_err(|e| {
                FetcherError::schema_mismatch(
                    format!("'data' is not a list of observations: {e}"),
                    body,
                )
            })?;
            return Ok(RawSeries::Commodity(observations));
        }

        let series = data.as_object().ok_or_else(|| {
            FetcherError::schema_mismatch(
                format!("'{}' is not an object", function.expected_key()),
                body,
            )
        })?;
        Ok(RawSeries::TimeSeries {
            instrument: instrument.to_string(),
            adjusted: function.is_adjusted(),
            series: series.clone(),
        })
    }
}

#[async_trait]
impl HistoricalFetcher for AlphaVantageFetcher {
    fn provider(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch(&self, request: &SeriesRequest) -> FetcherResult<FetchedSeries> {
        let function = self.resolve_function(request)?;
        let instrument = request.instrument.as_str();
        let credentials = &self.config.credentials;

        let mut retry = AdvisoryRetry::new(AdvisoryRetryPolicy {
            max_attempts: self.config.retry_ceiling.max(1),
            retry_delay: self.config.retry_delay,
            has_fallback_credential: credentials.fallback().is_some(),
            allow_compact_fallback: self.config.allow_compact_fallback,
        });
        let mut output_size = self.config.output_size;
        let mut api_key = credentials.primary();
        let mut degradation = None;
        let mut credential_fallbacks = 0;

        loop {
            let attempt = retry.begin_attempt();
            debug!(
                "Requesting {} for {} (attempt {}, outputsize={})",
                function, instrument, attempt, output_size
            );

            let params = Self::query_params(function, request, output_size, api_key);
            let body = self
                .http_client
                .get_json(&self.config.query_endpoint, &params)
                .await?;

            if let Some(data) = body.get(function.expected_key()) {
                retry.on_success();
                let raw = Self::parse_payload(function, instrument, data, &body)?;
                if raw.is_empty() {
                    return Err(FetcherError::EmptyResult {
                        instrument: instrument.to_string(),
                    });
                }

                return Ok(FetchedSeries {
                    raw,
                    degradation,
                    attempts: retry.attempts(),
                    credential_fallbacks,
                });
            }

            let Some(advisory) = Advisory::detect(&body) else {
                return Err(FetcherError::schema_mismatch(
                    format!("missing '{}' for {instrument}", function.expected_key()),
                    &body,
                ));
            };
            warn!(
                "Alpha Vantage advisory for {} on attempt {}: {}",
                instrument, attempt, advisory
            );

            match retry.on_advisory(&advisory, output_size) {
                AdvisoryDecision::CompactOutput => {
                    output_size = OutputSize::Compact;
                    let message = format!(
                        "outputsize=full refused for {instrument}; fell back to compact (latest 100 points only)"
                    );
                    warn!("{}", message);
                    degradation = Some(message);
                }
                AdvisoryDecision::FallbackCredential => {
                    let Some(fallback) = credentials.fallback() else {
                        return Err(FetcherError::Configuration(format!(
                            "fallback API key selected for {instrument} but none is configured"
                        )));
                    };
                    info!("Retrying {} with fallback API key", instrument);
                    api_key = fallback;
                    credential_fallbacks += 1;
                }
                AdvisoryDecision::Backoff { attempt, delay } => {
                    warn!(
                        "Throttled on attempt {}/{} for {}, waiting {:.1} seconds",
                        attempt,
                        self.config.retry_ceiling,
                        instrument,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                AdvisoryDecision::Failed { advisory } => {
                    return Err(FetcherError::RateLimited { advisory });
                }
            }
        }
    }
}
