//! Merger: ordered concatenation of segment files into the destination.
//!
//! Iterates the planned segment list, never the directory listing, so output
//! order is independent of segment completion order and of how the platform
//! sorts filenames. Each part file is deleted as soon as it has been fully
//! appended. Failures leave all unconsumed parts on disk.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::job::SegmentFile;

/// I/O or consistency failure while assembling the destination file.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("segment file {} holds {actual} bytes, expected {expected}", path.display())]
    Incomplete {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("merge I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
    move |source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Concatenates `parts` in planned byte order into `destination`, streaming
/// `block_size` bytes at a time, and deletes each part after it is consumed.
///
/// Every closed segment's file length is verified up front so a truncated
/// part aborts the merge before anything is deleted. A single-segment job
/// reduces to a rename.
pub fn merge(destination: &Path, parts: &[SegmentFile], block_size: usize) -> Result<(), MergeError> {
    for part in parts {
        if let Some(expected) = part.segment.len() {
            let actual = std::fs::metadata(&part.path)
                .map(|m| m.len())
                .map_err(io_err(&part.path))?;
            if actual != expected {
                return Err(MergeError::Incomplete {
                    path: part.path.clone(),
                    expected,
                    actual,
                });
            }
        }
    }

    if let [only] = parts {
        std::fs::rename(&only.path, destination).map_err(io_err(destination))?;
        tracing::debug!(destination = %destination.display(), "single segment renamed into place");
        return Ok(());
    }

    let mut out = File::create(destination).map_err(io_err(destination))?;
    let mut buf = vec![0u8; block_size.max(1)];
    for part in parts {
        let mut reader = File::open(&part.path).map_err(io_err(&part.path))?;
        loop {
            let n = reader.read(&mut buf).map_err(io_err(&part.path))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).map_err(io_err(destination))?;
        }
        drop(reader);
        std::fs::remove_file(&part.path).map_err(io_err(&part.path))?;
    }
    out.sync_all().map_err(io_err(destination))?;
    tracing::debug!(
        destination = %destination.display(),
        parts = parts.len(),
        "segments merged"
    );
    Ok(())
}
