//! Download one file over HTTP with several concurrent range requests,
//! merging the ranges into the output file as they arrive.

pub mod download;

pub use download::chunk_range::{plan_ranges, ByteRange, DownloadPlan};
pub use download::config::{Config, DownloaderConfig};
pub use download::downloader::{DownloadReport, Downloader, RunState};
pub use download::error::{DownloadError, TransportError};
pub use download::progress::{ProgressEvent, ProgressSnapshot};
pub use download::transport::{HttpTransport, MetadataProbe, RangeResponse, RangeTransport, ResourceMetadata};
