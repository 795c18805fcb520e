//!
//! 配置模块
//!

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;
pub const DEFAULT_FRAME_SIZE: usize = 16 * 1024;
pub const DEFAULT_PREALLOCATION_BLOCK_SIZE: usize = 10 * 1024 * 1024;

/// Settings of a single run.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub url: Url,
    pub output_path: PathBuf,
    pub worker_count: NonZeroUsize,
    pub queue_capacity: NonZeroUsize,
    pub frame_size: NonZeroUsize,
    pub preallocation_block_size: NonZeroUsize,
}

impl DownloaderConfig {
    pub fn new(url: Url, output_path: impl Into<PathBuf>) -> Self {
        Self {
            url,
            output_path: output_path.into(),
            worker_count: non_zero(DEFAULT_WORKER_COUNT),
            queue_capacity: non_zero(DEFAULT_QUEUE_CAPACITY),
            frame_size: non_zero(DEFAULT_FRAME_SIZE),
            preallocation_block_size: non_zero(DEFAULT_PREALLOCATION_BLOCK_SIZE),
        }
    }

    pub fn with_worker_count(mut self, worker_count: NonZeroUsize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: NonZeroUsize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_frame_size(mut self, frame_size: NonZeroUsize) -> Self {
        self.frame_size = frame_size;
        self
    }

    pub fn with_preallocation_block_size(mut self, block_size: NonZeroUsize) -> Self {
        self.preallocation_block_size = block_size;
        self
    }

    /// Apply the tunables of a settings file.
    pub fn with_settings(self, config: &Config) -> Self {
        self.with_worker_count(config.threads)
            .with_queue_capacity(config.queue_capacity)
            .with_frame_size(config.frame_size)
            .with_preallocation_block_size(config.preallocation_block_size)
    }
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}

/// Settings file, JSON.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub threads: NonZeroUsize,
    pub queue_capacity: NonZeroUsize,
    pub frame_size: NonZeroUsize,
    pub preallocation_block_size: NonZeroUsize,
    pub download_dir: PathBuf,
    pub user_agent: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let config_data = fs::read_to_string(file_path)
            .with_context(|| format!("Reading config failed: {}", file_path.display()))?;
        let config: Config = serde_json::from_str(&config_data)
            .with_context(|| format!("Parsing config failed: {}", file_path.display()))?;

        Ok(config)
    }

    /// `<config dir>/mtget/config.json`
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("mtget");
        path.push("config.json");
        Some(path)
    }

    /// The explicit file if given, otherwise the default file when it exists,
    /// otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: non_zero(DEFAULT_WORKER_COUNT),
            queue_capacity: non_zero(DEFAULT_QUEUE_CAPACITY),
            frame_size: non_zero(DEFAULT_FRAME_SIZE),
            preallocation_block_size: non_zero(DEFAULT_PREALLOCATION_BLOCK_SIZE),
            download_dir: PathBuf::from("."),
            user_agent: None,
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn should_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "threads": 16, "download_dir": "/tmp/dl" }}"#).unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.threads.get(), 16);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.queue_capacity.get(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.frame_size.get(), DEFAULT_FRAME_SIZE);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "threads": 0 }}"#).unwrap();

        assert!(Config::load_from_file(file.path()).is_err());
    }

    #[test]
    fn settings_apply_to_run_config() {
        let url = Url::parse("http://localhost/a.bin").unwrap();
        let settings = Config {
            threads: NonZeroUsize::new(8).unwrap(),
            queue_capacity: NonZeroUsize::new(32).unwrap(),
            ..Config::default()
        };

        let config = DownloaderConfig::new(url, "a.bin").with_settings(&settings);
        assert_eq!(config.worker_count.get(), 8);
        assert_eq!(config.queue_capacity.get(), 32);
        assert_eq!(config.frame_size.get(), DEFAULT_FRAME_SIZE);
        assert_eq!(config.preallocation_block_size.get(), DEFAULT_PREALLOCATION_BLOCK_SIZE);
    }
}
