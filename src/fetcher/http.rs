//! HTTP transport shared by all providers
//!
//! Provides a JSON GET helper with:
//! - per-request timeout and `User-Agent`
//! - retries with capped exponential backoff on 429, 5xx and network errors
//! - fail-fast on other 4xx statuses and on non-JSON bodies

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::TransportConfig;
use crate::fetcher::retry_formatter::{extract_error_type, RetryContext};
use crate::fetcher::{FetcherError, FetcherResult};

/// JSON-over-HTTP client bound to one provider base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    transport: TransportConfig,
}

impl HttpClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    /// Returns [`FetcherError::Configuration`] if the underlying client cannot be built
    pub fn new(base_url: impl Into<String>, transport: &TransportConfig) -> FetcherResult<Self> {
        let client = Client::builder()
            .timeout(transport.request_timeout)
            .user_agent(transport.user_agent.clone())
            .build()
            .map_err(|e| FetcherError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport: transport.clone(),
        })
    }

    /// Execute a GET request and parse the body as JSON
    ///
    /// # Arguments
    /// * `endpoint` - Path appended to the base URL (e.g., "/api/v3/klines")
    /// * `params` - Query parameters
    ///
    /// # Errors
    /// [`FetcherError::Transport`] once retries are exhausted or on a
    /// non-retryable status; [`FetcherError::SchemaMismatch`] if the body is not JSON
    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> FetcherResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} with {} params", url, params.len());
        let body = self.request_with_retry(&url, params).await?;

        serde_json::from_str(&body).map_err(|e| FetcherError::SchemaMismatch {
            reason: format!("response from {url} is not valid JSON: {e}"),
            payload: body,
        })
    }

    async fn request_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> FetcherResult<String> {
        let max_attempts = self.transport.max_retries + 1;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let response = self.client.get(url).query(params).send().await;
            let (error_type, status, message) = match response {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                if attempt > 1 {
                                    debug!(
                                        "Request succeeded on attempt {}/{}",
                                        attempt, max_attempts
                                    );
                                }
                                return Ok(body);
                            }
                            // Connection dropped mid-body
                            Err(e) => (
                                extract_error_type(None, Some(&e)),
                                Some(status.as_u16()),
                                format!("Failed to read response body: {e}"),
                            ),
                        }
                    } else {
                        let error_type = extract_error_type(Some(status), None);
                        let text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "<unreadable body>".to_string());

                        if !error_type.is_retryable() {
                            return Err(FetcherError::Transport {
                                status: Some(status.as_u16()),
                                message: format!("{}: {}", error_type.description(), text),
                            });
                        }

                        (error_type, Some(status.as_u16()), format!("{status}: {text}"))
                    }
                }
                Err(e) => (extract_error_type(None, Some(&e)), None, e.to_string()),
            };

            let context = RetryContext {
                attempt,
                max_attempts,
                error_type,
                backoff: self.transport.backoff(attempt - 1),
                endpoint: url.to_string(),
                error_message: message.clone(),
            };

            if attempt >= max_attempts {
                error!("{}", context.format_failure());
                return Err(FetcherError::Transport { status, message });
            }

            warn!("{}", context.format_retry());
            tokio::time::sleep(context.backoff).await;
        }
    }
}
