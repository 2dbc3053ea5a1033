//! Segment fetcher: one byte range, one file, resumable.
//!
//! Each segment is streamed into its own file by exactly one worker. On a
//! short read or transient network failure the fetcher recomputes the resume
//! offset from the bytes actually on disk and re-issues a narrower range
//! request, under the bounded backoff of [`RetryPolicy`]. A `200 OK` answer
//! to a ranged request means the server rejected range semantics; that is
//! terminal and fails the segment without retry.

mod attempt;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use thiserror::Error;

use crate::job::CancelToken;
use crate::plan::Segment;
use crate::progress::ProgressCounter;
use crate::retry::{classify_curl_error, classify_http_status, ErrorKind, RetryDecision, RetryPolicy};

/// Failure of a single segment fetch, after retries are exhausted.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Network(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("server ignored the range request (200 to a ranged GET)")]
    RangeIgnored,
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: u64, received: u64 },
    #[error("server overran the requested range: expected {expected} bytes, received {received}")]
    Overrun { expected: u64, received: u64 },
    #[error("segment file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Retry classification for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network(e) => classify_curl_error(e),
            FetchError::Http(code) => classify_http_status(*code),
            FetchError::ShortRead { .. } => ErrorKind::Interrupted,
            FetchError::RangeIgnored
            | FetchError::Overrun { .. }
            | FetchError::Io(_)
            | FetchError::Cancelled => ErrorKind::Fatal,
        }
    }
}

/// Downloads `segment` of `url` into `path`, retrying with backoff until the
/// full range is on disk or a terminal error occurs.
///
/// When `ranged` is false (single-segment plan against a server without
/// range support) the request carries no `Range` header and an interrupted
/// transfer restarts from byte zero, since the server cannot resume.
/// The shared `progress` counter is credited once per byte: bytes already on
/// disk from an earlier run are credited up front, and re-downloaded bytes
/// after a from-scratch restart are only counted past the previous
/// high-water mark.
#[allow(clippy::too_many_arguments)]
pub fn fetch_segment(
    url: &str,
    headers: &HashMap<String, String>,
    segment: Segment,
    path: &Path,
    ranged: bool,
    policy: &RetryPolicy,
    block_size: usize,
    progress: &ProgressCounter,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    // High-water mark of bytes credited to `progress` for this segment.
    let counted = Arc::new(AtomicU64::new(0));

    if ranged {
        let existing = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if existing > 0 && segment.len().is_some_and(|exp| existing <= exp) {
            counted.store(existing, std::sync::atomic::Ordering::Relaxed);
            progress.add(existing);
            tracing::debug!(
                path = %path.display(),
                existing,
                "resuming segment from bytes already on disk"
            );
        }
    }

    let mut attempt = 1u32;
    loop {
        match attempt::fetch_once(
            url, headers, &segment, path, ranged, block_size, progress, &counted, cancel,
        ) {
            Ok(()) => return Ok(()),
            Err(e) => match policy.decide(attempt, e.kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        segment_start = segment.start,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "segment fetch interrupted, backing off before resume"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            },
        }
    }
}
