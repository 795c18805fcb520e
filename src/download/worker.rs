use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::BytesMut;
use reqwest::StatusCode;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use url::Url;

use crate::download::chunk_item::{Chunk, ChunkSender};
use crate::download::chunk_range::ByteRange;
use crate::download::error::{DownloadError, TransportError, WorkerEndCause};
use crate::download::failure::FailureCoordinator;
use crate::download::transport::RangeTransport;

/// Fetches one range and forwards it to the writer frame by frame.
pub struct RangeWorker {
    index: usize,
    url: Arc<Url>,
    range: ByteRange,
    frame_size: usize,
    transport: Arc<dyn RangeTransport>,
    queue: ChunkSender,
    failure: Arc<FailureCoordinator>,
}

impl RangeWorker {
    pub fn new(
        index: usize,
        url: Arc<Url>,
        range: ByteRange,
        frame_size: NonZeroUsize,
        transport: Arc<dyn RangeTransport>,
        queue: ChunkSender,
        failure: Arc<FailureCoordinator>,
    ) -> Self {
        Self {
            index,
            url,
            range,
            frame_size: frame_size.get(),
            transport,
            queue,
            failure,
        }
    }

    pub async fn run(self) -> WorkerEndCause {
        match self.download().await {
            Ok(cause) => cause,
            Err(err) => {
                self.failure.try_set_failure(err);
                WorkerEndCause::Failed
            }
        }
    }

    async fn download(&self) -> Result<WorkerEndCause, DownloadError> {
        if self.range.is_empty() {
            debug!("[worker {}] Empty range, nothing to fetch", self.index);
            return Ok(WorkerEndCause::Finished);
        }

        if self.failure.is_aborted() {
            return Ok(self.aborted());
        }

        debug!("[worker {}] Fetching range {}", self.index, self.range);
        let response = self.transport.fetch_range(&self.url, self.range).await?;
        if response.status != StatusCode::PARTIAL_CONTENT {
            warn!("[worker {}] HTTP Status was {}", self.index, response.status);
            return Err(DownloadError::UnexpectedStatus(response.status));
        }

        let mut body = response.body;
        let mut pos = self.range.start;
        let end = self.range.end_exclusive();

        loop {
            if self.failure.is_aborted() {
                return Ok(self.aborted());
            }

            let mut frame = BytesMut::zeroed(self.frame_size);
            let count = body
                .read(&mut frame)
                .await
                .map_err(TransportError::from)?;
            frame.truncate(count);

            if count == 0 {
                break;
            }

            if pos + count as u64 > end {
                return Err(DownloadError::RangeLengthMismatch {
                    range: self.range,
                    received: pos + count as u64 - self.range.start,
                });
            }

            self.queue.push(Chunk::new(frame.freeze(), pos)).await?;
            pos += count as u64;
        }

        if pos != end {
            return Err(DownloadError::RangeLengthMismatch {
                range: self.range,
                received: pos - self.range.start,
            });
        }

        debug!("[worker {}] Range {} finished", self.index, self.range);
        Ok(WorkerEndCause::Finished)
    }

    fn aborted(&self) -> WorkerEndCause {
        warn!("[worker {}] Download aborted", self.index);
        WorkerEndCause::Aborted
    }
}
