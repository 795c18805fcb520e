use std::io::SeekFrom;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::download::chunk_item::{Chunk, ChunkReceiver};
use crate::download::error::DownloadError;
use crate::download::failure::FailureCoordinator;
use crate::download::progress::{ProgressEvent, ProgressPublisher, ProgressTracker, RATE_SAMPLE_INTERVAL};

/// Sole owner of the output file. Workers never touch it; they hand their
/// bytes over through the transfer queue and the writer puts each chunk at
/// its own offset.
pub struct OutputWriter {
    path: PathBuf,
    file: File,
    total_size: u64,
    progress: ProgressPublisher,
}

impl OutputWriter {
    pub async fn create(
        path: impl AsRef<Path>,
        total_size: u64,
        progress: ProgressPublisher,
    ) -> Result<Self, DownloadError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|source| DownloadError::FileCreate { path: path.clone(), source })?;

        Ok(Self { path, file, total_size, progress })
    }

    /// Zero-fill `[0, total_size)` block by block so that the random writes
    /// later on never hit holes in a sparse file.
    ///
    /// Progress goes out at most once per [`RATE_SAMPLE_INTERVAL`], plus the
    /// final `written == total` event.
    pub async fn preallocate(&mut self, block_size: NonZeroUsize) -> Result<(), DownloadError> {
        let block = vec![0u8; block_size.get()];
        let mut pos = 0u64;

        self.progress.publish(ProgressEvent::Preallocating { written: 0, total: self.total_size });
        let mut last_published = Instant::now();

        while pos < self.total_size {
            let len = (self.total_size - pos).min(block.len() as u64) as usize;
            self.file
                .write_all(&block[..len])
                .await
                .map_err(|source| DownloadError::FileCreate { path: self.path.clone(), source })?;
            pos += len as u64;

            let now = Instant::now();
            if pos == self.total_size || now.duration_since(last_published) >= RATE_SAMPLE_INTERVAL {
                self.progress.publish(ProgressEvent::Preallocating { written: pos, total: self.total_size });
                last_published = now;
            }
        }

        self.file
            .flush()
            .await
            .map_err(|source| DownloadError::FileCreate { path: self.path.clone(), source })?;
        debug!("Preallocated {} bytes for {}", self.total_size, self.path.display());

        Ok(())
    }

    /// Drain the queue until it is closed and empty, then close the file.
    /// Returns the number of bytes written.
    ///
    /// A failing write aborts the run but the loop keeps popping, so producers
    /// blocked on a full queue are released.
    ///
    /// `File::write_all` returns once the bytes are handed to the blocking
    /// pool, and an error surfaces on the next file operation. A chunk is
    /// therefore counted only after the following operation succeeded.
    pub async fn run(mut self, mut queue: ChunkReceiver, failure: Arc<FailureCoordinator>) -> u64 {
        let mut tracker = ProgressTracker::new(self.total_size, queue.capacity(), Instant::now());
        let mut unconfirmed = 0u64;
        let mut write_failed = false;

        while let Some(chunk) = queue.pop().await {
            if write_failed {
                continue;
            }

            if let Err(err) = self.write_chunk(&chunk).await {
                failure.try_set_failure(DownloadError::Write(err));
                write_failed = true;
                continue;
            }

            let confirmed = std::mem::replace(&mut unconfirmed, chunk.payload.len() as u64);
            if tracker.record(confirmed, queue.depth(), Instant::now()) {
                self.progress.publish(ProgressEvent::Transferring(tracker.snapshot()));
            }
        }

        if !write_failed {
            match self.close().await {
                Ok(()) => {
                    tracker.record(unconfirmed, 0, Instant::now());
                }
                Err(err) => {
                    failure.try_set_failure(DownloadError::Write(err));
                }
            }
        }

        let mut snapshot = tracker.snapshot();
        snapshot.queue_depth = 0;
        self.progress.publish(ProgressEvent::Finished(snapshot));
        info!("Wrote {} of {} bytes to {}", snapshot.bytes_written, self.total_size, self.path.display());

        tracker.bytes_written()
    }

    async fn write_chunk(&mut self, chunk: &Chunk) -> std::io::Result<()> {
        debug_assert!(chunk.offset + chunk.payload.len() as u64 <= self.total_size);
        self.file.seek(SeekFrom::Start(chunk.offset)).await?;
        self.file.write_all(&chunk.payload).await
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }
}
