//! Alpha Vantage advisories and the retry state machine driven by them
//!
//! Alpha Vantage answers throttled or plan-restricted calls with HTTP 200 and
//! a body carrying a `Note` or `Information` string instead of data. The
//! transport layer cannot see these, so [`AdvisoryRetry`] decides what to do
//! with each one:
//!
//! ```text
//! Trying ──advisory──► Advised(CompactOutput) ──► Trying
//!    │                 Advised(FallbackCredential) ──► Trying
//!    │                 Advised(Backoff) ──sleep──► Trying
//!    │                 Advised(Failed)
//!    └──payload──► Succeeded
//! ```

use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::config::OutputSize;

/// Top-level keys Alpha Vantage uses for advisories, in lookup order
const ADVISORY_KEYS: &[&str] = &["Note", "Information"];

/// Phrases that mark an advisory as call-frequency throttling
const RATE_LIMIT_PHRASES: &[&str] = &[
    "call frequency",
    "rate limit",
    "requests per",
    "calls per",
];

/// What an advisory is complaining about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryKind {
    /// Call frequency or daily quota exceeded
    Throttled,
    /// `outputsize=full` is not available on this plan
    PremiumOutputSize,
    /// The function itself is not available on this plan
    PremiumFeature,
}

/// Advisory message returned in place of data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// Classification
    pub kind: AdvisoryKind,
    /// Provider text, verbatim
    pub message: String,
}

impl Advisory {
    /// Extract an advisory from a response body
    ///
    /// Returns `None` when the body carries neither `Note` nor `Information`
    /// as a string. Callers only consult this after the expected data key was
    /// found missing.
    pub fn detect(body: &Value) -> Option<Self> {
        let message = ADVISORY_KEYS
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))?;

        Some(Self {
            kind: Self::classify(message),
            message: message.to_string(),
        })
    }

    /// Classify advisory text
    pub fn classify(message: &str) -> AdvisoryKind {
        let lower = message.to_lowercase();
        let mentions_rate_limit = RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p));

        if lower.contains("premium") && lower.contains("outputsize") {
            AdvisoryKind::PremiumOutputSize
        } else if (lower.contains("premium endpoint") || lower.contains("premium feature"))
            && !mentions_rate_limit
        {
            AdvisoryKind::PremiumFeature
        } else {
            AdvisoryKind::Throttled
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Limits applied by [`AdvisoryRetry`]
#[derive(Debug, Clone)]
pub struct AdvisoryRetryPolicy {
    /// Calls allowed before a throttling advisory becomes fatal
    pub max_attempts: u32,
    /// Sleep before retrying a throttled call
    pub retry_delay: Duration,
    /// Whether a fallback credential is configured
    pub has_fallback_credential: bool,
    /// Whether `full` may be downgraded to `compact`
    pub allow_compact_fallback: bool,
}

/// Next step after an advisory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryDecision {
    /// Retry with `outputsize=compact`
    CompactOutput,
    /// Retry with the fallback credential
    FallbackCredential,
    /// Sleep `delay`, then retry
    Backoff {
        /// Call that was throttled
        attempt: u32,
        /// Delay before the next call
        delay: Duration,
    },
    /// Give up
    Failed {
        /// Advisory that ended the fetch
        advisory: String,
    },
}

/// Current state of an advisory-aware fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Call in flight
    Trying {
        /// 1-based call number
        attempt: u32,
    },
    /// Last call returned an advisory and this was decided
    Advised(AdvisoryDecision),
    /// Valid payload received
    Succeeded,
}

/// Advisory retry state machine for one instrument
#[derive(Debug, Clone)]
pub struct AdvisoryRetry {
    policy: AdvisoryRetryPolicy,
    state: RetryState,
    attempts: u32,
    compact_used: bool,
    fallback_used: bool,
}

impl AdvisoryRetry {
    /// Start a fresh machine; no call has been made yet
    pub fn new(policy: AdvisoryRetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Trying { attempt: 1 },
            attempts: 0,
            compact_used: false,
            fallback_used: false,
        }
    }

    /// Current state
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Calls issued so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the fallback credential has been substituted
    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    /// Whether the output size was downgraded to `compact`
    pub fn compact_used(&self) -> bool {
        self.compact_used
    }

    /// Record that a call is about to be issued; returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.state = RetryState::Trying {
            attempt: self.attempts,
        };
        self.attempts
    }

    /// Record a valid payload
    pub fn on_success(&mut self) {
        self.state = RetryState::Succeeded;
    }

    /// Decide what to do after `advisory` was returned for a call made with
    /// `output_size`
    pub fn on_advisory(
        &mut self,
        advisory: &Advisory,
        output_size: OutputSize,
    ) -> AdvisoryDecision {
        let decision = if advisory.kind == AdvisoryKind::PremiumOutputSize
            && output_size == OutputSize::Full
            && self.policy.allow_compact_fallback
            && !self.compact_used
        {
            self.compact_used = true;
            AdvisoryDecision::CompactOutput
        } else if self.policy.has_fallback_credential && !self.fallback_used {
            self.fallback_used = true;
            AdvisoryDecision::FallbackCredential
        } else if advisory.kind == AdvisoryKind::Throttled
            && self.attempts < self.policy.max_attempts
        {
            AdvisoryDecision::Backoff {
                attempt: self.attempts,
                delay: self.policy.retry_delay,
            }
        } else {
            AdvisoryDecision::Failed {
                advisory: advisory.message.clone(),
            }
        };

        self.state = RetryState::Advised(decision.clone());
        decision
    }
}
