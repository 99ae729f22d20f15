//! Retry and backoff policy for library API requests.

use std::time::Duration;

/// Default number of attempts per request (first try included).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound on a single backoff delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(8);

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Attempts actually made, never below one.
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.backoff_base, self.backoff_max)
    }
}

/// Whether a reqwest error is worth retrying.
///
/// Connection failures, timeouts and interrupted bodies are transient.
/// `idempotent` requests are also retried on 502/503/504; a POST is only
/// retried when it never reached the server.
pub fn is_transient_network_error(error: &reqwest::Error, idempotent: bool) -> bool {
    if error.is_connect() {
        return true;
    }
    if !idempotent {
        return false;
    }
    if error.is_timeout() || error.is_body() {
        return true;
    }
    if let Some(status) = error.status() {
        return is_transient_status(status.as_u16());
    }
    false
}

/// 502 Bad Gateway, 503 Service Unavailable, 504 Gateway Timeout.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// Parse the Retry-After header value in seconds.
pub fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Exponential backoff with a small fixed jitter, capped at `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_ms = (base.as_millis() as u64).min(1000);
    let jitter = Duration::from_millis(jitter_ms / 2);
    exponential.saturating_add(jitter).min(max)
}
