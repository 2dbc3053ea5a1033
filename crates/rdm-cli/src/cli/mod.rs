//! CLI for the RDM ranged downloader.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rdm_core::config;

use commands::{run_batch, run_get};

/// Top-level CLI for the RDM downloader.
#[derive(Debug, Parser)]
#[command(name = "rdm")]
#[command(about = "RDM: ranged, concurrent, resumable downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a single URL.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Directory to save into (default: current directory).
        #[arg(long, short = 'C', value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Explicit output filename.
        #[arg(long, short = 'o', value_name = "NAME")]
        output: Option<String>,

        /// Prefer the server-suggested filename (Content-Disposition).
        #[arg(long)]
        server_name: bool,

        /// Override the configured maximum concurrent segment fetches.
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Override the configured minimum segment size in bytes.
        #[arg(long, value_name = "BYTES")]
        min_segment: Option<u64>,
    },

    /// Download every URL in a JSON list file.
    Batch {
        /// Path to a JSON array of URLs.
        list: PathBuf,

        /// Directory to save into (default: current directory).
        #[arg(long, short = 'C', value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Number of downloads to run at once (each is further segmented).
        #[arg(long, default_value = "4", value_name = "N")]
        jobs: usize,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                dir,
                output,
                server_name,
                concurrency,
                min_segment,
            } => {
                if let Some(n) = concurrency {
                    cfg.max_concurrency = n.max(1);
                }
                if let Some(bytes) = min_segment {
                    cfg.min_segment_bytes = bytes.max(1);
                }
                let dir = match dir {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                run_get(cfg, &url, &dir, output, server_name)
            }
            CliCommand::Batch { list, dir, jobs } => {
                let dir = match dir {
                    Some(d) => d,
                    None => std::env::current_dir()?,
                };
                run_batch(cfg, &list, &dir, jobs)
            }
        }
    }
}
