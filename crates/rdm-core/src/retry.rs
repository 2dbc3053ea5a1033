//! Retry classification and backoff policy for segment fetches.
//!
//! A short read or transient network failure is retried with exponential
//! backoff up to a bounded attempt count; the fetcher carries the resume
//! offset between attempts so a retry never re-downloads bytes already on
//! disk. Terminal errors (4xx, range semantics rejected, local I/O) are
//! never retried.

use std::time::Duration;

/// High-level classification of a fetch failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or read timed out.
    Timeout,
    /// Network-level failure (reset, DNS, nothing received).
    Connection,
    /// Server asked us to slow down (429/503).
    Throttled,
    /// Retryable server error (other 5xx).
    ServerError(u16),
    /// Stream ended before the requested range was delivered.
    Interrupted,
    /// Not retryable.
    Fatal,
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per segment, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Decides whether attempt number `attempt` (1-based) may be retried
    /// after failing with `kind`, and with what delay.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if kind == ErrorKind::Fatal || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let shift = attempt.saturating_sub(1).min(8);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}

/// Maps an HTTP status to a retry classification.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::ServerError(code as u16),
        _ => ErrorKind::Fatal,
    }
}

/// Maps a curl transport error to a retry classification.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_partial_file()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Fatal
}
