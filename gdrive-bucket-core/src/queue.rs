//! Unbounded multi-producer / multi-consumer work queue with acknowledgement
//! tracking, in the spirit of a classic `put` / `get` / `task_done` / `join` queue.
//!
//! Items travel over an `async_channel`. Every item put on the queue (work or
//! shutdown sentinel) counts as unfinished until a consumer acknowledges it.
//! [`WorkQueue::join`] returns once that count reaches zero.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::MirrorError;

/// What a consumer receives from [`WorkQueue::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    Work(T),
    /// No more work for the consumer that receives this.
    Shutdown,
}

pub struct WorkQueue<T> {
    tx: Sender<QueueItem<T>>,
    rx: Receiver<QueueItem<T>>,
    unfinished: AtomicUsize,
    drained: Notify,
    // Puts hold it shared, closing holds it exclusively, so no work lands behind the sentinels.
    gate: RwLock<()>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            tx,
            rx,
            unfinished: AtomicUsize::new(0),
            drained: Notify::new(),
            gate: RwLock::new(()),
        }
    }

    fn send(&self, item: QueueItem<T>) -> Result<(), MirrorError> {
        // Counted before sending so a fast consumer cannot acknowledge it first.
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) | Err(TrySendError::Full(_)) => {
                self.task_done();
                Err(MirrorError::QueueClosed)
            }
        }
    }

    /// Enqueue one unit of work. Fails once the queue has been closed.
    pub fn put(&self, item: T) -> Result<(), MirrorError> {
        let _open = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.send(QueueItem::Work(item))
    }

    /// Refuse further work and enqueue `consumers` shutdown sentinels behind
    /// whatever is already queued. Returns `false` if the queue was already closed.
    pub fn close_with_sentinels(&self, consumers: usize) -> bool {
        let _closing = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        if self.tx.is_closed() {
            return false;
        }
        for _ in 0..consumers {
            if self.send(QueueItem::Shutdown).is_err() {
                return false;
            }
        }
        self.tx.close();
        true
    }

    /// Wait for the next item. Items are handed out in FIFO order. A closed
    /// queue with nothing left in it also reads as [`QueueItem::Shutdown`].
    pub async fn get(&self) -> QueueItem<T> {
        self.rx.recv().await.unwrap_or(QueueItem::Shutdown)
    }

    /// Acknowledge one item previously returned by [`get`](Self::get).
    pub fn task_done(&self) {
        match self
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(1) => self.drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => warn!("task_done called more times than items were queued"),
        }
    }

    /// Guard that acknowledges one item when dropped, whichever way the
    /// consumer's scope is left.
    pub fn acknowledge_on_drop(&self) -> Acknowledgement<'_, T> {
        Acknowledgement { queue: self }
    }

    /// Wait until every item ever put has been acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so an acknowledgement in between is not missed.
            notified.as_mut().enable();
            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items waiting to be claimed.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Items put but not yet acknowledged (claimed or not).
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Poll until fewer than `threshold` items are waiting, logging an
    /// estimate on every poll. This is progress reporting only: shutdown is
    /// driven by [`close_with_sentinels`](Self::close_with_sentinels).
    pub async fn wait_until_drained(&self, threshold: usize, interval: Duration) {
        loop {
            let pending = self.pending();
            info!(pending, "Estimate to process: {pending}");
            if pending < threshold {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    }
}

pub struct Acknowledgement<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<T> Drop for Acknowledgement<'_, T> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
