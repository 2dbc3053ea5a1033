//! One ranged GET attempt, streamed block-by-block into the segment file.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::FetchError;
use crate::job::CancelToken;
use crate::plan::Segment;
use crate::progress::ProgressCounter;

/// Runs a single transfer attempt for `segment`, appending to `path` from
/// wherever the previous attempt left off. Returns `Ok` only when the whole
/// remaining range arrived.
#[allow(clippy::too_many_arguments)]
pub(super) fn fetch_once(
    url: &str,
    headers: &HashMap<String, String>,
    segment: &Segment,
    path: &Path,
    ranged: bool,
    block_size: usize,
    progress: &ProgressCounter,
    counted: &Arc<AtomicU64>,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    let expected = segment.len();
    let mut existing = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    if ranged {
        if let Some(exp) = expected {
            if existing > exp {
                // More bytes on disk than the range covers; the file cannot
                // be trusted, start the segment over.
                file.set_len(0)?;
                existing = 0;
            } else if existing == exp {
                return Ok(());
            }
        }
    } else if existing > 0 {
        // No range support: the server always sends the whole body, so an
        // interrupted transfer restarts from byte zero.
        file.set_len(0)?;
        existing = 0;
    }

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Abort when throughput sits below 1 KiB/s for 60s; a hard wall-clock
    // timeout would kill large segments on slow links.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.timeout(Duration::from_secs(3600))?;
    easy.buffer_size(block_size.max(1024))?;

    if ranged {
        easy.range(&segment.range_value_from(segment.start + existing))?;
    }

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !headers.is_empty() {
        easy.http_headers(list)?;
    }

    let status = Arc::new(AtomicU32::new(0));
    let fetched = Arc::new(AtomicU64::new(existing));
    let failure: Arc<Mutex<Option<FetchError>>> = Arc::new(Mutex::new(None));

    {
        let status_hdr = Arc::clone(&status);
        let status_body = Arc::clone(&status);
        let fetched_cb = Arc::clone(&fetched);
        let failure_cb = Arc::clone(&failure);
        let counted_cb = Arc::clone(counted);
        let progress_cb = progress.clone();
        let cancel_cb = cancel.clone();
        let mut out = file;

        let mut transfer = easy.transfer();
        transfer.header_function(move |data| {
            if let Some(code) = parse_status_line(data) {
                status_hdr.store(code, Ordering::Relaxed);
            }
            true
        })?;
        transfer.write_function(move |data| {
            if cancel_cb.is_cancelled() {
                let _ = failure_cb.lock().unwrap().replace(FetchError::Cancelled);
                return Ok(0);
            }
            // A 200 to a ranged request would deliver the whole resource;
            // bail before any of it reaches the segment file.
            if ranged && status_body.load(Ordering::Relaxed) == 200 {
                let _ = failure_cb.lock().unwrap().replace(FetchError::RangeIgnored);
                return Ok(0);
            }
            if let Err(e) = out.write_all(data) {
                let _ = failure_cb.lock().unwrap().replace(FetchError::Io(e));
                return Ok(0);
            }
            let total = fetched_cb.fetch_add(data.len() as u64, Ordering::Relaxed)
                + data.len() as u64;
            let prev = counted_cb.fetch_max(total, Ordering::Relaxed);
            if total > prev {
                progress_cb.add(total - prev);
            }
            Ok(data.len())
        })?;

        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                if let Some(cause) = failure.lock().unwrap().take() {
                    return Err(cause);
                }
            }
            return Err(FetchError::Network(e));
        }
    }

    let code = easy.response_code()?;
    if ranged && code == 200 {
        return Err(FetchError::RangeIgnored);
    }
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    if let Some(exp) = expected {
        let received = fetched.load(Ordering::Relaxed);
        if received < exp {
            return Err(FetchError::ShortRead {
                expected: exp,
                received,
            });
        }
        // More bytes than the range covers would surface later as a baffling
        // merge failure; report it at the segment that caused it.
        if received > exp {
            return Err(FetchError::Overrun {
                expected: exp,
                received,
            });
        }
    }

    Ok(())
}

/// Status code from an `HTTP/<ver> <code> ...` header line, if this is one.
fn parse_status_line(data: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(data).ok()?;
    let line = line.trim();
    if !line.to_ascii_uppercase().starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line(b"HTTP/1.1 206 Partial Content\r\n"), Some(206));
        assert_eq!(parse_status_line(b"HTTP/2 200\r\n"), Some(200));
        assert_eq!(parse_status_line(b"Content-Length: 200\r\n"), None);
        assert_eq!(parse_status_line(b"\r\n"), None);
    }
}
