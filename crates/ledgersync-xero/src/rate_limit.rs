//! Back-off policy for rate-limited Xero requests
//!
//! Xero answers HTTP 429 when a tenant exceeds its minute or daily call
//! allowance, usually with a `Retry-After` header in seconds.
//!
//! ## Policy
//!
//! - [`RetryPolicy`]: bounded exponential back-off. The delay starts at
//!   `initial_delay`, doubles on every further attempt and is capped at
//!   `max_delay`. A larger `Retry-After` replaces the computed delay (still
//!   capped). After `max_attempts` responses of 429 the request fails.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use ledgersync_xero::rate_limit::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for(1, None), Duration::from_secs(3));
//! assert_eq!(policy.delay_for(2, None), Duration::from_secs(6));
//! ```

use std::time::Duration;

use ledgersync_core::config::RetryConfig;
use tracing::warn;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded exponential back-off for HTTP 429 responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first request
    pub max_attempts: u32,
    /// Delay after the first 429
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy with no waiting, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retrying after the `attempt`-th (1-based) 429
    ///
    /// `retry_after` is the server-requested delay, if any.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        match retry_after {
            Some(requested) if requested > backoff => requested.min(self.max_delay),
            _ => backoff,
        }
    }

    /// True when another attempt is allowed after `attempt` attempts
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// ============================================================================
// Retry-After parsing
// ============================================================================

/// Parses the `Retry-After` header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30"), which is what Xero sends
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT") - parsed as seconds from now
///
/// Returns `None` if parsing fails.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            let secs = (target - now).num_seconds();
            if let Ok(secs) = u64::try_from(secs) {
                return Some(Duration::from_secs(secs));
            }
        }
        return Some(Duration::ZERO);
    }

    warn!(value, "Could not parse Retry-After header");
    None
}
