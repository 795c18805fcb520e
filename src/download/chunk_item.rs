use std::num::NonZeroUsize;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::download::error::DownloadError;

/// Bytes received for one frame, tagged with their absolute offset in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub payload: Bytes,
    pub offset: u64,
}

impl Chunk {
    pub fn new(payload: Bytes, offset: u64) -> Self {
        Self { payload, offset }
    }
}

/// Bounded queue between the workers and the writer. Its capacity is the
/// only thing bounding memory use during a run.
pub fn transfer_queue(capacity: NonZeroUsize) -> (ChunkSender, ChunkReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.get());
    (ChunkSender { sender }, ChunkReceiver { receiver, capacity: capacity.get() })
}

/// Producer half. Every worker owns a clone; the queue closes once the last
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    sender: mpsc::Sender<Chunk>,
}

impl ChunkSender {
    /// Waits while the queue is full.
    pub async fn push(&self, chunk: Chunk) -> Result<(), DownloadError> {
        self.sender
            .send(chunk)
            .await
            .map_err(|_| DownloadError::QueueClosed)
    }

    /// Drop this handle. Kept explicit so the shutdown order reads clearly.
    pub fn close(self) {}
}

/// Consumer half, owned by the writer.
#[derive(Debug)]
pub struct ChunkReceiver {
    receiver: mpsc::Receiver<Chunk>,
    capacity: usize,
}

impl ChunkReceiver {
    /// `None` once every sender is gone and the queue is drained.
    pub async fn pop(&mut self) -> Option<Chunk> {
        self.receiver.recv().await
    }

    pub fn depth(&self) -> usize {
        self.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn chunk(offset: u64) -> Chunk {
        Chunk::new(Bytes::from_static(b"abcd"), offset)
    }

    #[tokio::test]
    async fn push_blocks_when_full() {
        let (sender, mut receiver) = transfer_queue(NonZeroUsize::new(2).unwrap());

        sender.push(chunk(0)).await.unwrap();
        sender.push(chunk(4)).await.unwrap();
        assert_eq!(receiver.depth(), 2);

        let blocked = tokio::time::timeout(Duration::from_millis(50), sender.push(chunk(8))).await;
        assert!(blocked.is_err(), "push into a full queue must wait");
        assert!(receiver.depth() <= receiver.capacity());

        let pending = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.push(chunk(8)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        assert_eq!(receiver.pop().await.unwrap().offset, 0);
        pending.await.unwrap().unwrap();
        assert_eq!(receiver.depth(), 2);
    }

    #[tokio::test]
    async fn closes_after_last_sender_and_drain() {
        let (sender, mut receiver) = transfer_queue(NonZeroUsize::new(4).unwrap());
        let other = sender.clone();

        sender.push(chunk(0)).await.unwrap();
        other.push(chunk(4)).await.unwrap();
        sender.close();
        other.close();

        assert_eq!(receiver.pop().await.unwrap().offset, 0);
        assert_eq!(receiver.pop().await.unwrap().offset, 4);
        assert!(receiver.pop().await.is_none());
    }

    #[tokio::test]
    async fn push_fails_without_receiver() {
        let (sender, receiver) = transfer_queue(NonZeroUsize::new(1).unwrap());
        drop(receiver);

        assert!(matches!(sender.push(chunk(0)).await, Err(DownloadError::QueueClosed)));
    }
}
