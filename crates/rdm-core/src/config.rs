use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per segment, including the first.
    pub max_attempts: u32,
    /// Base backoff delay in seconds (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Cap on the backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Download engine configuration, loaded from `~/.config/rdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Smallest byte range worth its own segment; resources below twice this
    /// size download as fewer, larger segments.
    pub min_segment_bytes: u64,
    /// Upper bound on concurrent segment fetches per job.
    pub max_concurrency: usize,
    /// Coordinator poll interval between completion checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Streaming block size for fetch and merge I/O, in bytes.
    pub block_size: usize,
    /// Optional retry policy; built-in defaults apply when missing.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            min_segment_bytes: 100 * 1024 * 1024,
            max_concurrency: 8,
            poll_interval_ms: 1000,
            block_size: 8192,
            retry: None,
        }
    }
}

impl DownloadConfig {
    /// Effective retry policy for segment fetches.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            },
            None => RetryPolicy::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DownloadConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DownloadConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DownloadConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = DownloadConfig::default();
        assert_eq!(cfg.min_segment_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.max_concurrency, 8);
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.block_size, 8192);
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = DownloadConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DownloadConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.min_segment_bytes, cfg.min_segment_bytes);
        assert_eq!(parsed.max_concurrency, cfg.max_concurrency);
        assert_eq!(parsed.poll_interval_ms, cfg.poll_interval_ms);
        assert_eq!(parsed.block_size, cfg.block_size);
    }

    #[test]
    fn custom_values_with_retry_section() {
        let toml = r#"
            min_segment_bytes = 1048576
            max_concurrency = 4
            poll_interval_ms = 250
            block_size = 65536

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: DownloadConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.min_segment_bytes, 1_048_576);
        assert_eq!(cfg.max_concurrency, 4);
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }

    #[test]
    fn missing_retry_section_uses_defaults() {
        let toml = r#"
            min_segment_bytes = 1000
            max_concurrency = 2
            poll_interval_ms = 100
            block_size = 4096
        "#;
        let cfg: DownloadConfig = toml::from_str(toml).unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, RetryPolicy::default().max_attempts);
    }
}
