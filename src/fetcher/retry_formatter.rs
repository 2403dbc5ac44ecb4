//! Retry classification and log message formatting for the HTTP transport.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Classification of transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 400 (bad symbol, bad interval, ...)
    InvalidRequest,
    /// HTTP 401/403
    AuthFailed(u16),
    /// Other 4xx, including Binance's 418 IP ban
    ClientError(u16),
    /// Anything else
    NetworkGeneric,
}

impl RetryErrorType {
    /// Short description used inside log messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::InvalidRequest => "invalid request",
            Self::AuthFailed(_) => "authentication failed",
            Self::ClientError(code) => match code {
                404 => "resource not found",
                418 => "IP banned by provider",
                451 => "unavailable due to restrictions",
                _ => "client error",
            },
            Self::NetworkGeneric => "network error",
        }
    }

    /// Remediation hint printed with the final failure
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection or raise --request-timeout-secs",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Increase the delay between requests or wait before rerunning",
            Self::ServerError(_) => "Provider may be experiencing issues, try again later",
            Self::InvalidRequest => "Check instrument, interval and date arguments for typos",
            Self::AuthFailed(_) => "Verify the configured API key",
            Self::ClientError(_) => "Review request parameters against the provider documentation",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether another attempt can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RetryErrorType::InvalidRequest
                | RetryErrorType::AuthFailed(_)
                | RetryErrorType::ClientError(_)
        )
    }
}

/// Context for one retry decision
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempt that just failed (1-based)
    pub attempt: u32,
    /// Total attempts allowed
    pub max_attempts: u32,
    /// Failure classification
    pub error_type: RetryErrorType,
    /// Wait before the next attempt
    pub backoff: Duration,
    /// Endpoint URL that failed
    pub endpoint: String,
    /// Underlying error text
    pub error_message: String,
}

impl RetryContext {
    /// Format the "retrying" log line
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... [{}]",
            self.attempt + 1,
            self.max_attempts,
            self.error_type.description(),
            self.backoff.as_secs_f64(),
            self.endpoint
        )
    }

    /// Format the final failure summary
    pub fn format_failure(&self) -> String {
        format!(
            "Request failed after {} attempt(s): {} ({}). {}",
            self.attempt,
            self.error_type.description(),
            self.error_message,
            self.error_type.suggestion()
        )
    }
}

/// Classify an HTTP status or reqwest error
pub fn extract_error_type(
    status: Option<StatusCode>,
    err: Option<&ReqwestError>,
) -> RetryErrorType {
    if let Some(status) = status {
        match status.as_u16() {
            400 => return RetryErrorType::InvalidRequest,
            401 | 403 => return RetryErrorType::AuthFailed(status.as_u16()),
            429 => return RetryErrorType::RateLimit,
            _ => {}
        }

        if status.is_server_error() {
            return RetryErrorType::ServerError(status.as_u16());
        }

        if status.is_client_error() {
            return RetryErrorType::ClientError(status.as_u16());
        }
    }

    if let Some(err) = err {
        if err.is_timeout() {
            return RetryErrorType::NetworkTimeout;
        }

        if err.is_connect() {
            return RetryErrorType::NetworkOffline;
        }
    }

    RetryErrorType::NetworkGeneric
}
