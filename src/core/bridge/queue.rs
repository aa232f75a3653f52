use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

/// Unbounded FIFO with a bounded-wait dequeue.
///
/// `push` never blocks and never drops items. `wait_for_item` waits up to a
/// timeout for the next item and returns `None` when nothing arrived, which
/// callers must treat as "nothing this tick".
pub struct WaitQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Mutex<mpsc::UnboundedReceiver<T>>,
}

impl<T: Send> WaitQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueue an item.
    pub fn push(&self, item: T) {
        // The receiver lives as long as the queue, so this cannot fail
        let _ = self.tx.send(item);
    }

    /// Wait up to `timeout` for the next item.
    pub async fn wait_for_item(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Drop every queued item, returning how many were dropped.
    ///
    /// Waits for a consumer parked in `wait_for_item` to time out first.
    pub async fn clear(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl<T: Send> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
