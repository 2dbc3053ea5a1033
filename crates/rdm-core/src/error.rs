//! Job-level error taxonomy.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::merge::MergeError;
use crate::plan::PlanError;
use crate::probe::ProbeError;

/// Terminal failure of one download job.
///
/// `Busy` is the only non-fatal variant: it rejects a re-entrant start and
/// leaves the running job untouched. Everything else moves the job to
/// `Failed`, with partial segment files left on disk for inspection or a
/// later resume.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("a download is already in progress on this job")]
    Busy,
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("segment {index} failed: {source}")]
    Fetch {
        index: usize,
        #[source]
        source: FetchError,
    },
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
}
