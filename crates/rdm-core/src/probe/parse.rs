//! Interpret probe response headers.

use super::{ProbeError, ProbeResult, PROBE_SLICE_BYTES};
use crate::name;

/// Builds a [`ProbeResult`] from the final response's status and headers.
pub(super) fn parse_probe(status: u32, lines: &[String]) -> Result<ProbeResult, ProbeError> {
    let mut content_length: Option<u64> = None;
    let mut accept_ranges_bytes = false;
    let mut content_range: Option<String> = None;
    let mut content_disposition: Option<String> = None;

    for line in lines {
        let (key, value) = match line.split_once(':') {
            Some(kv) => kv,
            None => continue,
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<u64>().ok();
        } else if key.eq_ignore_ascii_case("accept-ranges") {
            accept_ranges_bytes = value.eq_ignore_ascii_case("bytes");
        } else if key.eq_ignore_ascii_case("content-range") {
            content_range = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("content-disposition") {
            content_disposition = Some(value.to_string());
        }
    }

    let accepts_ranges =
        status == 206 || accept_ranges_bytes || content_length == Some(PROBE_SLICE_BYTES);

    let total_size = match content_range {
        Some(cr) => content_range_total(&cr)?,
        // With no Content-Range, a partial response's Content-Length is the
        // slice we asked for, not the resource size; only a full response's
        // Content-Length can be trusted.
        None if status == 206 => return Err(ProbeError::MissingLength),
        None => content_length.ok_or(ProbeError::MissingLength)?,
    };

    let suggested_name = content_disposition
        .as_deref()
        .and_then(name::filename_from_content_disposition)
        .map(|n| name::sanitize_filename(&n))
        .filter(|n| !n.is_empty());

    Ok(ProbeResult {
        accepts_ranges,
        total_size,
        suggested_name,
    })
}

/// Total size from a `Content-Range` value, format `bytes <start>-<end>/<total>`.
fn content_range_total(value: &str) -> Result<u64, ProbeError> {
    value
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| ProbeError::BadContentRange(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partial_content_with_content_range() {
        let r = parse_probe(
            206,
            &lines(&[
                "HTTP/1.1 206 Partial Content",
                "Content-Length: 8",
                "Content-Range: bytes 0-7/123456",
            ]),
        )
        .unwrap();
        assert!(r.accepts_ranges);
        assert_eq!(r.total_size, 123_456);
    }

    #[test]
    fn full_response_with_accept_ranges_header() {
        let r = parse_probe(
            200,
            &lines(&[
                "HTTP/1.1 200 OK",
                "Content-Length: 9999",
                "Accept-Ranges: bytes",
            ]),
        )
        .unwrap();
        assert!(r.accepts_ranges);
        assert_eq!(r.total_size, 9999);
    }

    #[test]
    fn slice_sized_content_length_implies_range_support() {
        // An 8-byte Content-Length answering an 8-byte range request marks
        // the server range-capable even without an explicit marker header.
        let r = parse_probe(
            200,
            &lines(&["HTTP/1.1 200 OK", "Content-Length: 8"]),
        )
        .unwrap();
        assert!(r.accepts_ranges);
    }

    #[test]
    fn range_ignoring_server() {
        let r = parse_probe(
            200,
            &lines(&[
                "HTTP/1.1 200 OK",
                "Content-Length: 5000",
                "Accept-Ranges: none",
            ]),
        )
        .unwrap();
        assert!(!r.accepts_ranges);
        assert_eq!(r.total_size, 5000);
    }

    #[test]
    fn partial_without_content_range_has_no_size() {
        let err = parse_probe(
            206,
            &lines(&["HTTP/1.1 206 Partial Content", "Content-Length: 8"]),
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::MissingLength));
    }

    #[test]
    fn missing_size_entirely() {
        let err = parse_probe(200, &lines(&["HTTP/1.1 200 OK"])).unwrap_err();
        assert!(matches!(err, ProbeError::MissingLength));
    }

    #[test]
    fn unparsable_content_range() {
        let err = parse_probe(
            206,
            &lines(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 0-7/*"]),
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::BadContentRange(_)));
    }

    #[test]
    fn suggested_name_from_content_disposition() {
        let r = parse_probe(
            200,
            &lines(&[
                "HTTP/1.1 200 OK",
                "Content-Length: 100",
                "Accept-Ranges: bytes",
                "Content-Disposition: attachment; filename=\"release.tar.xz\"",
            ]),
        )
        .unwrap();
        assert_eq!(r.suggested_name.as_deref(), Some("release.tar.xz"));
    }
}
