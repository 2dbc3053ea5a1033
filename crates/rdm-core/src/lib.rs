pub mod config;
pub mod logging;

pub mod error;
pub mod fetch;
pub mod job;
pub mod merge;
pub mod name;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod retry;

pub use error::DownloadError;
pub use job::{CancelToken, DownloadRequest, Downloader, JobState};
