use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::io;

use crate::download::chunk_range::ByteRange;

/// 传输层错误，由 probe / ranged fetch 产生
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IOError: {0}")]
    Io(#[from] io::Error),
}

/// 下载中发生的错误
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Could not fetch file information: {0}")]
    MetadataFetch(#[source] TransportError),

    #[error("Could not fetch file information: HTTP {0}")]
    MetadataStatus(StatusCode),

    #[error("Server does not support multithreaded downloads")]
    RangeUnsupported,

    #[error("Invalid content length received: {0:?}")]
    InvalidSize(String),

    #[error("Could not create output file {}: {source}", .path.display())]
    FileCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Transfer failed: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP status was {0}, expected 206 Partial Content")]
    UnexpectedStatus(StatusCode),

    #[error("Range {range} received {received} bytes, expected {}", .range.len())]
    RangeLengthMismatch { range: ByteRange, received: u64 },

    #[error("Write to output file failed: {0}")]
    Write(#[source] io::Error),

    #[error("Transfer queue closed before all chunks were delivered")]
    QueueClosed,

    #[error("Download task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Download aborted after {bytes_written} of {total_size} bytes: {cause}")]
    Aborted {
        cause: Box<DownloadError>,
        bytes_written: u64,
        total_size: u64,
    },

    #[error("A download is already running")]
    AlreadyRunning,
}

impl DownloadError {
    /// The error that actually stopped the run, looking through [`DownloadError::Aborted`].
    pub fn root_cause(&self) -> &DownloadError {
        match self {
            DownloadError::Aborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// 单个 worker 结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEndCause {
    Finished,
    Aborted,
    Failed,
}
