//! Range math: splits a resource into contiguous byte-range segments.
//!
//! The planner produces the ordered segment list that flows unchanged from
//! here through the fetch workers to the merger, so correctness never
//! depends on filesystem listing order or filename parsing.

use thiserror::Error;

/// Invalid planner input.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot plan segments for an empty resource")]
    EmptyResource,
    #[error("minimum segment size must be non-zero")]
    ZeroSegmentSize,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// A single segment: inclusive byte range `[start, end]`.
/// `end == None` means "to the end of the resource" (open-ended range).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive), or `None` for an open-ended range.
    pub end: Option<u64>,
}

impl Segment {
    /// Closed range `[start, end]`, both inclusive.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Open-ended range `[start, ..]` to the end of the resource.
    pub fn open(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Number of bytes covered, if the range is closed.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|e| e.saturating_sub(self.start) + 1)
    }

    /// Byte-range value for the remainder of this segment starting at
    /// absolute offset `from`: `from-end`, or `from-` when open-ended.
    /// On the wire this becomes `Range: bytes=<value>`.
    pub fn range_value_from(&self, from: u64) -> String {
        match self.end {
            Some(end) => format!("{}-{}", from, end),
            None => format!("{}-", from),
        }
    }
}

/// Plans the ordered segment list for a resource of `total_size` bytes.
///
/// Segment count is `max(1, min(max_concurrency, total_size / min_segment_bytes))`.
/// Each segment gets `total_size / count` bytes; the final segment's end is
/// clamped to `total_size - 1` so the union covers `[0, total_size - 1]`
/// exactly. A server without range support gets a single open-ended segment
/// covering the whole resource.
pub fn plan_ranges(
    total_size: u64,
    min_segment_bytes: u64,
    max_concurrency: usize,
    accepts_ranges: bool,
) -> Result<Vec<Segment>, PlanError> {
    if total_size == 0 {
        return Err(PlanError::EmptyResource);
    }
    if min_segment_bytes == 0 {
        return Err(PlanError::ZeroSegmentSize);
    }
    if max_concurrency == 0 {
        return Err(PlanError::ZeroConcurrency);
    }

    if !accepts_ranges {
        return Ok(vec![Segment::open(0)]);
    }

    let count = (total_size / min_segment_bytes)
        .min(max_concurrency as u64)
        .max(1);

    let seg_size = total_size / count;
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let start = i * seg_size;
        let end = if i == count - 1 {
            total_size - 1
        } else {
            (i + 1) * seg_size - 1
        };
        out.push(Segment::new(start, end));
    }
    Ok(out)
}
