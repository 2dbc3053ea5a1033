//! Minimal HTTP/1.1 server with HEAD and Range GET for integration tests.
//!
//! Serves a single static body. Supports configurable range behavior:
//! honest 206 slices, servers that hide or lack range support, servers that
//! advertise ranges but ignore them on GET, truncated responses for resume
//! tests, and artificial response delays for busy/cancel tests.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// GET honors Range with 206 slices; HEAD answers a ranged request with
    /// 206 + Content-Range. When false the server always sends 200 + full body.
    pub support_ranges: bool,
    /// Send `Accept-Ranges: bytes` on responses.
    pub advertise_ranges: bool,
    /// Advertise ranges on HEAD but ignore Range on GET (lying server).
    pub ignore_range_on_get: bool,
    /// Serve this many initial ranged GETs short: declare the full slice
    /// length but close after `truncate_to` bytes.
    pub truncate_first_gets: usize,
    /// Bytes actually delivered on a truncated response.
    pub truncate_to: u64,
    /// Extra bytes appended past the requested range on ranged GETs, with
    /// the declared Content-Length enlarged to match (misbehaving server).
    pub overrun_by: u64,
    /// Sleep before writing a GET body, for cancellation/busy tests.
    pub delay_body_ms: u64,
    /// Content-Disposition header value sent on HEAD responses.
    pub content_disposition: Option<String>,
}

impl RangeServerOptions {
    pub fn ranged() -> Self {
        Self {
            support_ranges: true,
            advertise_ranges: true,
            ..Self::default()
        }
    }

    pub fn plain() -> Self {
        Self::default()
    }
}

/// Starts a server on a background thread serving `body`; returns its base
/// URL. Runs until the process exits.
pub fn start(body: Vec<u8>, opts: RangeServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let gets_served = Arc::new(AtomicUsize::new(0));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let gets = Arc::clone(&gets_served);
            thread::spawn(move || handle(stream, &body, &opts, &gets));
        }
    });
    format!("http://127.0.0.1:{}/resource.bin", port)
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    gets_served: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    let accept_ranges = if opts.advertise_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let disposition = match &opts.content_disposition {
        Some(v) => format!("Content-Disposition: {}\r\n", v),
        None => String::new(),
    };

    if method.eq_ignore_ascii_case("HEAD") {
        let response = match range {
            Some((start, end)) if opts.support_ranges => {
                let end = end.min(total.saturating_sub(1));
                format!(
                    "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n{}{}\r\n",
                    end - start + 1, start, end, total, accept_ranges, disposition
                )
            }
            _ => format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}{}\r\n",
                total, accept_ranges, disposition
            ),
        };
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
        return;
    }

    let honor_range = opts.support_ranges && !opts.ignore_range_on_get;
    if opts.delay_body_ms > 0 {
        thread::sleep(Duration::from_millis(opts.delay_body_ms));
    }

    match range {
        Some((start, end)) if honor_range => {
            let served = gets_served.fetch_add(1, Ordering::SeqCst);
            let start = start.min(total);
            let end = end.min(total.saturating_sub(1));
            if start > end {
                let _ = stream.write_all(
                    format!(
                        "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n\r\n",
                        total
                    )
                    .as_bytes(),
                );
                return;
            }
            let slice = &body[start as usize..=end as usize];
            let extra = &body[..(opts.overrun_by as usize).min(body.len())];
            let header = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n{}\r\n",
                slice.len() + extra.len(), start, end, total, accept_ranges
            );
            let _ = stream.write_all(header.as_bytes());
            if served < opts.truncate_first_gets {
                // Declare the full slice but cut the stream short so the
                // client sees an interrupted transfer.
                let cut = (opts.truncate_to as usize).min(slice.len());
                let _ = stream.write_all(&slice[..cut]);
                return;
            }
            let _ = stream.write_all(slice);
            if !extra.is_empty() {
                let _ = stream.write_all(extra);
            }
        }
        _ => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n",
                total, accept_ranges
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
    }
}

/// Returns (method, optional `(start, end_inclusive)` from `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        let (name, value) = match line.split_once(':') {
            Some(kv) => kv,
            None => continue,
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let value = value.trim();
        let Some(spec) = value
            .strip_prefix("bytes=")
            .or_else(|| value.strip_prefix("Bytes="))
        else {
            continue;
        };
        if let Some((a, b)) = spec.split_once('-') {
            let start = a.trim().parse::<u64>().unwrap_or(0);
            let end = if b.trim().is_empty() {
                u64::MAX
            } else {
                b.trim().parse::<u64>().unwrap_or(0)
            };
            range = Some((start, end));
        }
    }
    (method, range)
}
