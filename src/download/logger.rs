//! 日志模块

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr, or to `log_file` when
/// given, so they never mix with the progress line on stdout.
/// `RUST_LOG` overrides `level`.
pub fn setup_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Opening log file failed: {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;

    Ok(())
}
