use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::download::error::DownloadError;

/// Set-once failure flag shared by every task of one run.
///
/// The first failure cancels the token and is kept as the cause. Later failures
/// are only counted. Workers poll [`FailureCoordinator::is_aborted`] between
/// frames, nothing is interrupted from outside.
#[derive(Debug, Default)]
pub struct FailureCoordinator {
    cancel_token: CancellationToken,
    cause: Mutex<Option<DownloadError>>,
    suppressed: AtomicUsize,
}

impl FailureCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this call recorded the cause.
    pub fn try_set_failure(&self, cause: DownloadError) -> bool {
        let mut guard = self.cause.lock();
        if guard.is_some() || self.cancel_token.is_cancelled() {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!("Suppressed failure after abort: {}", cause);
            return false;
        }

        error!("Download failed: {}", cause);
        *guard = Some(cause);
        self.cancel_token.cancel();

        true
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn take_cause(&self) -> Option<DownloadError> {
        self.cause.lock().take()
    }
}
