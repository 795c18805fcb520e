use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::Stream;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::download::chunk_item::transfer_queue;
use crate::download::chunk_manager::ChunkManager;
use crate::download::chunk_range::DownloadPlan;
use crate::download::config::DownloaderConfig;
use crate::download::error::DownloadError;
use crate::download::failure::FailureCoordinator;
use crate::download::progress::{ProgressEvent, ProgressPublisher};
use crate::download::transport::{HttpTransport, MetadataProbe, RangeTransport};
use crate::download::writer::OutputWriter;

type DownloadResult = Result<DownloadReport, DownloadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Planning,
    Preallocating,
    Streaming,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Planning | RunState::Preallocating | RunState::Streaming)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub total_size: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Downloads one resource with several concurrent range requests.
///
/// On failure the partially written output file is left on disk.
pub struct Downloader {
    config: Arc<DownloaderConfig>,
    probe: Arc<dyn MetadataProbe>,
    transport: Arc<dyn RangeTransport>,
    state: watch::Sender<RunState>,
    progress: ProgressPublisher,
}

impl Downloader {
    pub fn new(
        config: DownloaderConfig,
        probe: Arc<dyn MetadataProbe>,
        transport: Arc<dyn RangeTransport>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);

        Self {
            config: Arc::new(config),
            probe,
            transport,
            state,
            progress: ProgressPublisher::new(),
        }
    }

    /// Downloader backed by a single [`HttpTransport`] for probe and ranges.
    pub fn with_http(config: DownloaderConfig, transport: HttpTransport) -> Self {
        let transport = Arc::new(transport);
        Self::new(config, transport.clone(), transport)
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn progress_stream(&self) -> impl Stream<Item = ProgressEvent> + 'static {
        self.progress.stream()
    }

    pub async fn download(&self) -> DownloadResult {
        let started = self.state.send_if_modified(|state| {
            if state.is_active() {
                false
            } else {
                *state = RunState::Planning;
                true
            }
        });
        if !started {
            return Err(DownloadError::AlreadyRunning);
        }

        let result = self.run_download().await;
        match &result {
            Ok(report) => {
                info!("Downloaded {} bytes to {}", report.bytes_written, report.path.display());
                self.state.send_replace(RunState::Completed);
            }
            Err(err) => {
                warn!("Download failed: {}", err);
                self.state.send_replace(RunState::Failed);
            }
        }

        result
    }

    async fn run_download(&self) -> DownloadResult {
        let started_at = Instant::now();
        let config = &self.config;

        let metadata = self
            .probe
            .probe(&config.url)
            .await
            .map_err(DownloadError::MetadataFetch)?;
        let plan = DownloadPlan::from_metadata(config.url.clone(), &metadata, config.worker_count)?;
        let ranges = plan.ranges();
        info!("Downloading {} bytes from {} with {} workers", plan.total_size, plan.url, ranges.len());

        self.state.send_replace(RunState::Preallocating);
        let mut writer = OutputWriter::create(&config.output_path, plan.total_size, self.progress.clone()).await?;
        writer.preallocate(config.preallocation_block_size).await?;

        self.state.send_replace(RunState::Streaming);
        let failure = Arc::new(FailureCoordinator::new());
        let (queue, receiver) = transfer_queue(config.queue_capacity);
        let writer_handle = tokio::spawn(writer.run(receiver, failure.clone()));

        let workers = ChunkManager::spawn(
            Arc::new(plan.url.clone()),
            ranges,
            config.frame_size,
            self.transport.clone(),
            &queue,
            failure.clone(),
        );

        // Order matters: every worker has ended before the queue closes, and
        // the writer has drained it before the outcome is decided.
        let summary = workers.join().await;
        queue.close();
        let bytes_written = match writer_handle.await {
            Ok(bytes_written) => bytes_written,
            Err(err) => {
                failure.try_set_failure(DownloadError::TaskJoin(err));
                0
            }
        };
        info!(
            "Workers ended: {} finished, {} aborted, {} failed, {} later failures suppressed",
            summary.finished,
            summary.aborted,
            summary.failed,
            failure.suppressed_count()
        );

        if let Some(cause) = failure.take_cause() {
            return Err(DownloadError::Aborted {
                cause: Box::new(cause),
                bytes_written,
                total_size: plan.total_size,
            });
        }

        Ok(DownloadReport {
            path: config.output_path.clone(),
            total_size: plan.total_size,
            bytes_written,
            elapsed: started_at.elapsed(),
        })
    }
}
