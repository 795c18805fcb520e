use std::num::NonZeroUsize;
use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::download::chunk_item::ChunkSender;
use crate::download::chunk_range::ByteRange;
use crate::download::error::{DownloadError, WorkerEndCause};
use crate::download::failure::FailureCoordinator;
use crate::download::transport::RangeTransport;
use crate::download::worker::RangeWorker;

/// Counts of how the workers of one run ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub finished: usize,
    pub aborted: usize,
    pub failed: usize,
}

/// One spawned task per range. Dropping the pool does not stop the workers;
/// call [`ChunkManager::join`] to wait for every one of them.
pub struct ChunkManager {
    workers: FuturesUnordered<JoinHandle<WorkerEndCause>>,
    failure: Arc<FailureCoordinator>,
}

impl ChunkManager {
    pub fn spawn(
        url: Arc<Url>,
        ranges: Vec<ByteRange>,
        frame_size: NonZeroUsize,
        transport: Arc<dyn RangeTransport>,
        queue: &ChunkSender,
        failure: Arc<FailureCoordinator>,
    ) -> Self {
        let workers = FuturesUnordered::new();

        for (index, range) in ranges.into_iter().enumerate() {
            let worker = RangeWorker::new(
                index,
                url.clone(),
                range,
                frame_size,
                transport.clone(),
                queue.clone(),
                failure.clone(),
            );
            workers.push(tokio::spawn(worker.run()));
        }
        debug!("Started {} workers", workers.len());

        Self { workers, failure }
    }

    /// Completion barrier: returns only once every worker task has ended, no
    /// matter how. A panicked worker is reported as a failure.
    pub async fn join(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();

        while let Some(result) = self.workers.next().await {
            match result {
                Ok(WorkerEndCause::Finished) => summary.finished += 1,
                Ok(WorkerEndCause::Aborted) => summary.aborted += 1,
                Ok(WorkerEndCause::Failed) => summary.failed += 1,
                Err(err) => {
                    self.failure.try_set_failure(DownloadError::TaskJoin(err));
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
