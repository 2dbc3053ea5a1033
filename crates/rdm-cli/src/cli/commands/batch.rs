//! `rdm batch`: download every URL from a JSON list file.
//!
//! The list runs on a small pool of worker threads, one independent
//! `Downloader` per URL. Failures are logged and counted; the command exits
//! nonzero if any URL failed, after the rest have finished.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use rdm_core::config::DownloadConfig;
use rdm_core::{DownloadRequest, Downloader};

use crate::ua;

pub fn run_batch(cfg: DownloadConfig, list: &Path, dir: &Path, jobs: usize) -> Result<()> {
    let raw = std::fs::read_to_string(list)
        .with_context(|| format!("reading URL list {}", list.display()))?;
    let urls: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of URLs", list.display()))?;
    if urls.is_empty() {
        println!("nothing to download");
        return Ok(());
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating download directory {}", dir.display()))?;

    let total = urls.len();
    let queue: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(urls.into()));
    let failures = Arc::new(AtomicUsize::new(0));

    let workers = jobs.max(1).min(total);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let failures = Arc::clone(&failures);
        let cfg = cfg.clone();
        let dir = dir.to_path_buf();
        handles.push(std::thread::spawn(move || loop {
            let url = match queue.lock().unwrap().pop_front() {
                Some(url) => url,
                None => break,
            };
            let mut req = DownloadRequest::new(&url, &dir);
            req.use_server_name = true;
            req.headers = ua::identity_headers();

            let dl = Downloader::new(cfg.clone());
            match dl.download(&req) {
                Ok(path) => println!("saved {}", path.display()),
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "batch item failed");
                    eprintln!("failed {}: {:#}", url, e);
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        let _ = h.join();
    }

    let failed = failures.load(Ordering::Relaxed);
    if failed > 0 {
        bail!("{failed} of {total} downloads failed");
    }
    println!("downloaded {total} files");
    Ok(())
}
