//! `rdm get`: download one URL with a live progress bar.

use std::path::Path;
use std::sync::mpsc;

use anyhow::{Context, Result};
use rdm_core::config::DownloadConfig;
use rdm_core::{DownloadRequest, Downloader};

use crate::render;
use crate::ua;

pub fn run_get(
    cfg: DownloadConfig,
    url: &str,
    dir: &Path,
    output: Option<String>,
    server_name: bool,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating download directory {}", dir.display()))?;

    let mut req = DownloadRequest::new(url, dir);
    req.filename = output;
    req.use_server_name = server_name;
    req.headers = ua::identity_headers();

    let (tx, rx) = mpsc::channel();
    let renderer = render::spawn_renderer(rx);

    let dl = Downloader::new(cfg).with_progress(tx);
    let result = dl
        .download(&req)
        .with_context(|| format!("downloading {}", url));

    // Close the progress channel so the renderer thread exits.
    drop(dl);
    let _ = renderer.join();

    let path = result?;
    println!("saved {}", path.display());
    Ok(())
}
