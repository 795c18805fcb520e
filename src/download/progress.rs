use std::time::{Duration, Instant};

use futures_util::Stream;
use tokio::sync::watch;

pub const MIB: f64 = 1_048_576.0;

/// Minimum wall-clock time between two rate samples.
pub const RATE_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes_written: u64,
    pub total_size: u64,
    pub last_sample_at: Instant,
    pub last_sample_bytes: u64,
    pub rate_bytes_per_sec: f64,
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

impl ProgressSnapshot {
    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            100.0
        } else {
            100.0 * self.bytes_written as f64 / self.total_size as f64
        }
    }

    pub fn mib_transferred(&self) -> f64 {
        self.bytes_written as f64 / MIB
    }

    pub fn rate_mib_per_sec(&self) -> f64 {
        self.rate_bytes_per_sec / MIB
    }

    pub fn queue_occupancy(&self) -> f64 {
        if self.queue_capacity == 0 {
            0.0
        } else {
            100.0 * self.queue_depth as f64 / self.queue_capacity as f64
        }
    }
}

/// What the writer publishes for the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    Idle,
    Preallocating { written: u64, total: u64 },
    Transferring(ProgressSnapshot),
    Finished(ProgressSnapshot),
}

/// Byte accounting for the writer. Owned by the writer task only.
#[derive(Debug)]
pub struct ProgressTracker {
    snapshot: ProgressSnapshot,
}

impl ProgressTracker {
    pub fn new(total_size: u64, queue_capacity: usize, started_at: Instant) -> Self {
        Self {
            snapshot: ProgressSnapshot {
                bytes_written: 0,
                total_size,
                last_sample_at: started_at,
                last_sample_bytes: 0,
                rate_bytes_per_sec: 0.0,
                queue_depth: 0,
                queue_capacity,
            },
        }
    }

    /// Account for `written` new bytes. Returns `true` when the rate was
    /// resampled, which is also when the snapshot is worth publishing.
    pub fn record(&mut self, written: u64, queue_depth: usize, now: Instant) -> bool {
        let snapshot = &mut self.snapshot;
        snapshot.bytes_written += written;
        snapshot.queue_depth = queue_depth;

        let elapsed = now.saturating_duration_since(snapshot.last_sample_at);
        if elapsed < RATE_SAMPLE_INTERVAL {
            return false;
        }

        let delta = snapshot.bytes_written - snapshot.last_sample_bytes;
        snapshot.rate_bytes_per_sec = delta as f64 / elapsed.as_secs_f64();
        snapshot.last_sample_bytes = snapshot.bytes_written;
        snapshot.last_sample_at = now;

        true
    }

    pub fn bytes_written(&self) -> u64 {
        self.snapshot.bytes_written
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
    }
}

/// Publishing side of the progress channel. `send_replace` never waits, so the
/// writer is never held up by a slow or missing display.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    sender: watch::Sender<ProgressEvent>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ProgressEvent::Idle);
        Self { sender }
    }

    pub fn publish(&self, event: ProgressEvent) {
        self.sender.send_replace(event);
    }

    #[cfg(test)]
    pub fn current(&self) -> ProgressEvent {
        *self.sender.borrow()
    }

    /// Latest events only: intermediate values are skipped when the consumer
    /// lags behind.
    pub fn stream(&self) -> impl Stream<Item = ProgressEvent> + 'static {
        let mut receiver = self.sender.subscribe();

        async_stream::stream! {
            let event = *receiver.borrow_and_update();
            yield event;

            while receiver.changed().await.is_ok() {
                let event = *receiver.borrow_and_update();
                yield event;
            }
        }
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[test]
    fn rate_resampled_at_most_once_per_second() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(10 * 1024 * 1024, 512, start);

        let mut resamples = 0;
        for i in 0..1000u64 {
            let now = start + Duration::from_millis(i);
            if tracker.record(1024, 3, now) {
                resamples += 1;
            }
        }
        assert_eq!(resamples, 0);
        assert_eq!(tracker.snapshot().rate_bytes_per_sec, 0.0);

        assert!(tracker.record(1024, 3, start + Duration::from_millis(1000)));
        let rate = tracker.snapshot().rate_bytes_per_sec;
        assert_eq!(rate, 1001.0 * 1024.0);

        // Same second again: the previous rate is reused.
        for i in 1..500u64 {
            assert!(!tracker.record(1, 0, start + Duration::from_millis(1000 + i)));
        }
        assert_eq!(tracker.snapshot().rate_bytes_per_sec, rate);
        assert_eq!(tracker.bytes_written(), 1001 * 1024 + 499);
    }

    #[test]
    fn snapshot_derived_values() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(4 * 1024 * 1024, 512, start);
        tracker.record(1024 * 1024, 128, start + Duration::from_secs(2));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.percentage(), 25.0);
        assert_eq!(snapshot.mib_transferred(), 1.0);
        assert_eq!(snapshot.rate_mib_per_sec(), 0.5);
        assert_eq!(snapshot.queue_occupancy(), 25.0);
    }

    #[test]
    fn empty_file_is_complete() {
        let tracker = ProgressTracker::new(0, 8, Instant::now());
        assert_eq!(tracker.snapshot().percentage(), 100.0);
    }

    #[tokio::test]
    async fn stream_yields_latest_event() {
        let publisher = ProgressPublisher::new();
        let mut stream = Box::pin(publisher.stream());

        assert_eq!(stream.next().await, Some(ProgressEvent::Idle));

        publisher.publish(ProgressEvent::Preallocating { written: 1, total: 4 });
        publisher.publish(ProgressEvent::Preallocating { written: 4, total: 4 });
        assert_eq!(stream.next().await, Some(ProgressEvent::Preallocating { written: 4, total: 4 }));

        drop(publisher);
        assert_eq!(stream.next().await, None);
    }
}
