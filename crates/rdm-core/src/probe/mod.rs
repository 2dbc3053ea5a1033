//! Capability probe: range support, total size, suggested filename.
//!
//! Issues a HEAD request for the first few bytes of the resource and judges
//! the server range-capable if it answers with 206 Partial Content, an
//! `Accept-Ranges: bytes` header, or a Content-Length equal to the probed
//! slice. The total size comes from the Content-Range total when present,
//! otherwise from the Content-Length of a full (200) response.

mod parse;

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Size of the byte slice requested by the probe (`Range: bytes=0-7`).
pub const PROBE_SLICE_BYTES: u64 = 8;

/// Probe failure. All variants are fatal for the job: without a total size
/// no segments can be planned.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Network(#[from] curl::Error),
    #[error("probe returned HTTP {0}")]
    Http(u32),
    #[error("response carries no usable total size")]
    MissingLength,
    #[error("unparsable Content-Range value: {0:?}")]
    BadContentRange(String),
}

/// What the probe learned about the resource.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// True if byte-range requests are honored.
    pub accepts_ranges: bool,
    /// Total resource size in bytes.
    pub total_size: u64,
    /// Sanitized filename from Content-Disposition, if the server sent one.
    pub suggested_name: Option<String>,
}

/// Probes `url` with a minimal ranged HEAD request.
///
/// `headers` are sent verbatim (the caller supplies the client identity,
/// e.g. a User-Agent). Redirects are followed; only the final response's
/// headers are evaluated.
pub fn probe(url: &str, headers: &HashMap<String, String>) -> Result<ProbeResult, ProbeError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;
    easy.range(&format!("0-{}", PROBE_SLICE_BYTES - 1))?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = std::str::from_utf8(data) {
                let s = s.trim_end();
                // A new status line starts the next hop's header block;
                // drop everything collected from the previous hop.
                if s.to_ascii_uppercase().starts_with("HTTP/") {
                    lines.clear();
                }
                lines.push(s.to_string());
            }
            true
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    if !(200..300).contains(&status) {
        return Err(ProbeError::Http(status));
    }

    let result = parse::parse_probe(status, &lines)?;
    tracing::debug!(
        url,
        accepts_ranges = result.accepts_ranges,
        total_size = result.total_size,
        "probe complete"
    );
    Ok(result)
}
