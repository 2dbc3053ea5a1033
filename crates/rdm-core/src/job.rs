//! Download job coordination.
//!
//! Owns the whole pipeline for one resource: probe → plan → fetch workers →
//! merge, with an explicit state machine guarding re-entrant starts. The
//! coordinator thread never does blocking I/O itself; it hands one fetch
//! task per segment to a bounded worker pool and polls a result channel on a
//! fixed interval so progress can be rendered between polls.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::fetch::{self, FetchError};
use crate::merge;
use crate::name;
use crate::plan;
use crate::probe;
use crate::progress::{ProgressCounter, ProgressStats};

/// Cooperative cancellation signal, checked by every fetch worker at each
/// streamed block boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; in-flight transfers abort at the next block.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clears the signal so a new run starts uncancelled.
    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Lifecycle of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    Idle = 0,
    Probing = 1,
    Planning = 2,
    Fetching = 3,
    Merging = 4,
    Done = 5,
    Failed = 6,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => JobState::Idle,
            1 => JobState::Probing,
            2 => JobState::Planning,
            3 => JobState::Fetching,
            4 => JobState::Merging,
            5 => JobState::Done,
            _ => JobState::Failed,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Probing => "probing",
            JobState::Planning => "planning",
            JobState::Fetching => "fetching",
            JobState::Merging => "merging",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Atomically updated job state; the busy guard is a compare-exchange on
/// this cell, not an ad hoc boolean.
#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> JobState {
        JobState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: JobState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves to `Probing` if the job is idle or finished; rejects a start
    /// while any earlier run is still active.
    fn try_start(&self) -> Result<(), DownloadError> {
        let current = self.0.load(Ordering::Acquire);
        let state = JobState::from_u8(current);
        if state != JobState::Idle && !state.is_terminal() {
            return Err(DownloadError::Busy);
        }
        self.0
            .compare_exchange(
                current,
                JobState::Probing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| DownloadError::Busy)
    }
}

/// One requested transfer.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Directory the final file is written into. Must exist.
    pub dest_dir: PathBuf,
    /// Explicit output filename; overrides everything else when set.
    pub filename: Option<String>,
    /// Prefer the server's Content-Disposition filename over the URL path.
    pub use_server_name: bool,
    /// Extra request headers, e.g. the caller's User-Agent.
    pub headers: HashMap<String, String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest_dir: dest_dir.into(),
            filename: None,
            use_server_name: false,
            headers: HashMap::new(),
        }
    }
}

/// A planned segment together with its on-disk part file. This ordered list
/// is the authoritative byte order from planner to merger.
#[derive(Debug, Clone)]
pub struct SegmentFile {
    pub segment: plan::Segment,
    pub path: PathBuf,
}

/// Part-file path for a segment: the destination path plus the segment's
/// start byte, zero-padded to 14 digits. The padding keeps names uniform;
/// ordering always comes from the planned list, never from a lexical sort.
pub fn segment_path(destination: &Path, start: u64) -> PathBuf {
    let mut os = destination.as_os_str().to_owned();
    os.push(format!(".{:014}", start));
    PathBuf::from(os)
}

/// One reusable download job. A single `Downloader` runs one transfer at a
/// time; a second `download` call while one is active returns
/// [`DownloadError::Busy`] without touching the running transfer.
pub struct Downloader {
    cfg: DownloadConfig,
    state: StateCell,
    bytes: ProgressCounter,
    cancel: CancelToken,
    progress_tx: Option<mpsc::Sender<ProgressStats>>,
}

impl Downloader {
    pub fn new(cfg: DownloadConfig) -> Self {
        Self {
            cfg,
            state: StateCell::default(),
            bytes: ProgressCounter::new(),
            cancel: CancelToken::new(),
            progress_tx: None,
        }
    }

    /// Registers an observer channel that receives a [`ProgressStats`]
    /// snapshot on every poll tick.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Current job state.
    pub fn state(&self) -> JobState {
        self.state.get()
    }

    /// Aggregate bytes written by the current (or last) run.
    pub fn bytes_written(&self) -> u64 {
        self.bytes.get()
    }

    /// Token for cooperative cancellation of the running transfer. The
    /// signal is cleared when a new run starts, so a cancelled `Downloader`
    /// can be reused.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs one full download and returns the final file path.
    ///
    /// On failure the job ends in `Failed` and any partial segment files are
    /// left on disk; a later `download` with the same destination resumes
    /// completed ranges instead of refetching them.
    pub fn download(&self, req: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        self.state.try_start()?;
        self.cancel.reset();
        tracing::info!(url = %req.url, "starting download");
        match self.run(req) {
            Ok(path) => {
                self.state.set(JobState::Done);
                tracing::info!(path = %path.display(), "download complete");
                Ok(path)
            }
            Err(e) => {
                self.state.set(JobState::Failed);
                tracing::error!(url = %req.url, error = %e, "download failed");
                Err(e)
            }
        }
    }

    fn run(&self, req: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        let probed = probe::probe(&req.url, &req.headers)?;
        tracing::info!(
            total_size = probed.total_size,
            accepts_ranges = probed.accepts_ranges,
            "probed resource"
        );

        let filename = req
            .filename
            .clone()
            .or_else(|| {
                if req.use_server_name {
                    probed.suggested_name.clone()
                } else {
                    None
                }
            })
            .unwrap_or_else(|| name::derive_filename(&req.url, None));
        let destination = req.dest_dir.join(filename);

        self.state.set(JobState::Planning);
        let segments = plan::plan_ranges(
            probed.total_size,
            self.cfg.min_segment_bytes,
            self.cfg.max_concurrency,
            probed.accepts_ranges,
        )?;
        let parts: Vec<SegmentFile> = segments
            .iter()
            .map(|s| SegmentFile {
                segment: *s,
                path: segment_path(&destination, s.start),
            })
            .collect();
        tracing::debug!(segments = parts.len(), "planned byte ranges");

        self.state.set(JobState::Fetching);
        self.bytes.reset();
        self.fetch_all(
            &req.url,
            &req.headers,
            &parts,
            probed.accepts_ranges,
            probed.total_size,
        )?;

        self.state.set(JobState::Merging);
        merge::merge(&destination, &parts, self.cfg.block_size)?;
        Ok(destination)
    }

    /// Dispatches one fetch task per segment onto a bounded worker pool and
    /// polls for completion, emitting progress between polls. All tasks are
    /// allowed to finish even when one fails; the first failure is reported
    /// after the pool drains and no merge is attempted.
    fn fetch_all(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        parts: &[SegmentFile],
        ranged: bool,
        total_size: u64,
    ) -> Result<(), DownloadError> {
        let policy = self.cfg.retry_policy();
        let workers = parts.len().min(self.cfg.max_concurrency).max(1);
        let queue: Arc<Mutex<VecDeque<(usize, SegmentFile)>>> =
            Arc::new(Mutex::new(parts.iter().cloned().enumerate().collect()));
        let (tx, rx) = mpsc::channel::<(usize, Result<(), FetchError>)>();

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let url = url.to_string();
            let headers = headers.clone();
            let progress = self.bytes.clone();
            let cancel = self.cancel.clone();
            let block_size = self.cfg.block_size;
            handles.push(std::thread::spawn(move || loop {
                let (index, part) = match queue.lock().unwrap().pop_front() {
                    Some(work) => work,
                    None => break,
                };
                let res = fetch::fetch_segment(
                    &url,
                    &headers,
                    part.segment,
                    &part.path,
                    ranged,
                    &policy,
                    block_size,
                    &progress,
                    &cancel,
                );
                if tx.send((index, res)).is_err() {
                    break;
                }
            }));
        }
        drop(tx);

        let poll = Duration::from_millis(self.cfg.poll_interval_ms.max(1));
        let started = Instant::now();
        let mut finished = 0usize;
        let mut first_failure: Option<(usize, FetchError)> = None;
        while finished < parts.len() {
            while let Ok((index, res)) = rx.try_recv() {
                finished += 1;
                if let Err(e) = res {
                    tracing::warn!(segment = index, error = %e, "segment task failed");
                    if first_failure.is_none() {
                        first_failure = Some((index, e));
                    }
                }
            }
            if finished >= parts.len() {
                break;
            }
            self.emit_progress(total_size, started, finished, parts.len());
            std::thread::sleep(poll);
        }
        for h in handles {
            let _ = h.join();
        }
        self.emit_progress(total_size, started, finished, parts.len());

        match first_failure {
            Some((index, source)) => Err(DownloadError::Fetch { index, source }),
            None => Ok(()),
        }
    }

    fn emit_progress(
        &self,
        total_bytes: u64,
        started: Instant,
        segments_done: usize,
        segment_count: usize,
    ) {
        let stats = ProgressStats {
            bytes_done: self.bytes.get(),
            total_bytes,
            elapsed_secs: started.elapsed().as_secs_f64(),
            segments_done,
            segment_count,
        };
        tracing::trace!(
            bytes_done = stats.bytes_done,
            total_bytes,
            segments_done,
            "progress"
        );
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(stats);
        }
    }
}
