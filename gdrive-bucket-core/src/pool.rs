//! Fixed-size pool of transfer workers draining a shared [`WorkQueue`].
//!
//! Every worker builds its own drive and bucket clients once, at startup, while
//! holding the pool's startup lock; transfers themselves run unsynchronised.
//! A worker never aborts on a failed file: the failure is recorded and the item
//! is acknowledged like any other.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::contract::{BucketStore, DriveApi, FailureRecord, Task, TransferReport};
use crate::error::MirrorError;
use crate::queue::{QueueItem, WorkQueue};
use crate::transfer::transfer;

#[derive(Debug, Default)]
struct Outcomes {
    transferred: Vec<TransferReport>,
    failures: Vec<FailureRecord>,
}

/// What the pool accomplished, returned by [`WorkerPool::shutdown`].
#[derive(Debug, Default)]
pub struct PoolReport {
    pub workers: usize,
    pub transferred: Vec<TransferReport>,
    pub failures: Vec<FailureRecord>,
}

pub struct WorkerPool {
    queue: Arc<WorkQueue<Task>>,
    handles: Vec<JoinHandle<()>>,
    live: usize,
    outcomes: Arc<Mutex<Outcomes>>,
}

fn lock(outcomes: &Mutex<Outcomes>) -> MutexGuard<'_, Outcomes> {
    outcomes.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) and wait until each has either
    /// built its clients or failed to. Workers that fail to start are logged
    /// and left out; the pool fails only if none start.
    pub async fn start<D, B, F>(
        size: usize,
        queue: Arc<WorkQueue<Task>>,
        connect: F,
    ) -> Result<Self, MirrorError>
    where
        D: DriveApi + 'static,
        B: BucketStore + 'static,
        F: Fn(usize) -> Result<(D, B), MirrorError> + Send + Sync + 'static,
    {
        let size = size.max(1);
        let connect = Arc::new(connect);
        // Serialises client construction across workers, nothing else.
        let startup = Arc::new(tokio::sync::Mutex::new(()));
        let outcomes = Arc::new(Mutex::new(Outcomes::default()));

        let mut handles = Vec::with_capacity(size);
        let mut readiness = Vec::with_capacity(size);
        for id in 0..size {
            let (ready, ready_rx) = oneshot::channel();
            readiness.push(ready_rx);
            handles.push(tokio::spawn(run_worker(
                id,
                queue.clone(),
                connect.clone(),
                startup.clone(),
                outcomes.clone(),
                ready,
            )));
        }

        let mut live = 0;
        let mut last_error = None;
        for (id, ready_rx) in readiness.into_iter().enumerate() {
            match ready_rx.await {
                Ok(Ok(())) => live += 1,
                Ok(Err(e)) => {
                    error!(worker = id, error = %e, "Transfer worker failed to start");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    error!(worker = id, "Transfer worker exited before reporting readiness");
                    last_error = Some(format!("worker {id} exited during startup"));
                }
            }
        }

        if live == 0 {
            return Err(MirrorError::NoWorkers(last_error.unwrap_or_default()));
        }
        info!(live, requested = size, "Transfer workers ready");

        Ok(Self {
            queue,
            handles,
            live,
            outcomes,
        })
    }

    pub fn live_workers(&self) -> usize {
        self.live
    }

    pub fn queue(&self) -> &Arc<WorkQueue<Task>> {
        &self.queue
    }

    /// Close the queue behind one sentinel per live worker, wait until every
    /// queued task and sentinel is acknowledged, then collect the outcomes.
    pub async fn shutdown(self) -> PoolReport {
        if !self.queue.close_with_sentinels(self.live) {
            warn!("Work queue was already closed before shutdown");
        }
        self.queue.join().await;

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Transfer worker did not exit cleanly");
            }
        }

        let outcomes = std::mem::take(&mut *lock(&self.outcomes));
        info!(
            transferred = outcomes.transferred.len(),
            failed = outcomes.failures.len(),
            "Transfer workers stopped"
        );
        PoolReport {
            workers: self.live,
            transferred: outcomes.transferred,
            failures: outcomes.failures,
        }
    }
}

async fn run_worker<D, B, F>(
    id: usize,
    queue: Arc<WorkQueue<Task>>,
    connect: Arc<F>,
    startup: Arc<tokio::sync::Mutex<()>>,
    outcomes: Arc<Mutex<Outcomes>>,
    ready: oneshot::Sender<Result<(), MirrorError>>,
) where
    D: DriveApi + 'static,
    B: BucketStore + 'static,
    F: Fn(usize) -> Result<(D, B), MirrorError> + Send + Sync + 'static,
{
    let clients = {
        let _guard = startup.lock().await;
        connect(id)
    };
    let (drive, bucket) = match clients {
        Ok(clients) => {
            let _ = ready.send(Ok(()));
            clients
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    debug!(worker = id, "Transfer worker started");

    loop {
        let item = queue.get().await;
        let _ack = queue.acknowledge_on_drop();
        let task = match item {
            QueueItem::Shutdown => break,
            QueueItem::Work(task) => task,
        };

        let outcome = AssertUnwindSafe(transfer(&task, &drive, &bucket))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(MirrorError::Panicked(panic_message(panic.as_ref()))));

        match outcome {
            Ok(report) => lock(&outcomes).transferred.push(report),
            Err(e) => {
                warn!(
                    worker = id,
                    file_id = %task.entry.id,
                    drive_path = %task.drive_path,
                    transient = e.is_transient(),
                    error = %e,
                    "Transfer failed, skipping file"
                );
                lock(&outcomes).failures.push(FailureRecord::new(&task, &e));
            }
        }
    }
    debug!(worker = id, "Transfer worker stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
