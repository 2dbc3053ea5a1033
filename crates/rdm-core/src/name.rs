//! Destination filename derivation.
//!
//! Prefers the server's Content-Disposition filename, falls back to the last
//! URL path segment, and sanitizes the result for local filesystems.

/// Used when neither the server nor the URL yields a usable name.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Derives a safe local filename for a download.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let candidate = content_disposition
        .and_then(filename_from_content_disposition)
        .or_else(|| filename_from_url(url));

    let sanitized = match candidate {
        Some(c) => sanitize_filename(&c),
        None => return DEFAULT_FILENAME.to_string(),
    };
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Extracts a filename from a Content-Disposition header value.
/// Handles `filename="quoted"` and bare `filename=token` parameters.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    for param in value.split(';') {
        let param = param.trim();
        let (key, v) = match param.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        if !key.trim().eq_ignore_ascii_case("filename") {
            continue;
        }
        let v = v.trim();
        let v = v
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(v);
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }
    None
}

/// Last non-empty path segment of the URL, if any.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Strips path separators, NUL and control characters, and leading or
/// trailing dots and spaces.
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0' && !c.is_control())
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == ' ').to_string()
}
