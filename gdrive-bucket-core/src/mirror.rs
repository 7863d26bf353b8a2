//! High-level pipeline: resolve the root, walk the tree, transfer every file.
//!
//! This module ties the pieces of a run together:
//!   - Parses and resolves the root spec (any failure here is fatal and happens
//!     before a single worker starts)
//!   - Starts the [`WorkerPool`], each worker with its own clients
//!   - Walks the tree in pre-order and enqueues one [`Task`](crate::contract::Task) per file
//!   - Closes the queue behind one sentinel per worker and waits for every
//!     acknowledgement
//!   - Returns a [`MirrorReport`] listing what was copied and what failed
//!
//! # Error Handling
//! Per-file failures never abort the run; they are collected into the report.
//! A listing failure part-way through the walk stops enqueueing, lets the
//! workers finish what is already queued, and is then returned as the error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::MirrorConfig;
use crate::contract::{BucketStore, DriveApi, FailureRecord, Task, TransferReport};
use crate::error::MirrorError;
use crate::lister::Lister;
use crate::pool::WorkerPool;
use crate::queue::WorkQueue;
use crate::resolver::{resolve, ResolvedRoot, RootSpec};
use crate::walker::TreeWalker;

#[derive(Debug, Serialize)]
pub struct MirrorReport {
    pub run_id: Uuid,
    pub root: String,
    pub bucket: String,
    pub workers: usize,
    pub folders_visited: usize,
    pub enqueued: usize,
    pub transferred: Vec<TransferReport>,
    pub failures: Vec<FailureRecord>,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Mirror the tree named by `config.root` into `config.bucket`.
///
/// `drive` serves the producer side (resolution and traversal). `connect`
/// builds one drive/bucket client pair per worker and is called once per
/// worker, under the pool's startup lock.
pub async fn mirror<P, D, B, F>(
    config: &MirrorConfig,
    drive: &P,
    connect: F,
) -> Result<MirrorReport, MirrorError>
where
    P: DriveApi + ?Sized,
    D: DriveApi + 'static,
    B: BucketStore + 'static,
    F: Fn(usize) -> Result<(D, B), MirrorError> + Send + Sync + 'static,
{
    let run_id = Uuid::new_v4();
    run(config, drive, connect, run_id)
        .instrument(info_span!("mirror", %run_id))
        .await
}

async fn run<P, D, B, F>(
    config: &MirrorConfig,
    drive: &P,
    connect: F,
    run_id: Uuid,
) -> Result<MirrorReport, MirrorError>
where
    P: DriveApi + ?Sized,
    D: DriveApi + 'static,
    B: BucketStore + 'static,
    F: Fn(usize) -> Result<(D, B), MirrorError> + Send + Sync + 'static,
{
    info!(root = %config.root, bucket = %config.bucket, "[MIRROR] Starting mirror run");

    let spec = RootSpec::parse(&config.root)?;
    let resolved = resolve(drive, &spec, config.tuning.page_size).await?;

    let queue = Arc::new(WorkQueue::new());
    let pool = WorkerPool::start(config.workers, queue.clone(), connect).await?;

    let (folders_visited, enqueued) =
        match enqueue_tree(drive, &spec, &resolved, &queue, config.tuning.page_size).await {
            Ok(counts) => counts,
            Err(e) => {
                error!(error = %e, "[MIRROR][ERROR] Traversal failed, draining queued work");
                let partial = pool.shutdown().await;
                warn!(
                    transferred = partial.transferred.len(),
                    failed = partial.failures.len(),
                    "[MIRROR] Workers drained after traversal failure"
                );
                return Err(e);
            }
        };
    info!(folders_visited, enqueued, "[MIRROR] Traversal complete");

    queue
        .wait_until_drained(config.tuning.drain_threshold, config.tuning.poll_interval())
        .await;
    let outcome = pool.shutdown().await;

    info!(
        transferred = outcome.transferred.len(),
        failed = outcome.failures.len(),
        "[MIRROR] All done"
    );
    Ok(MirrorReport {
        run_id,
        root: spec.display(),
        bucket: config.bucket.clone(),
        workers: outcome.workers,
        folders_visited,
        enqueued,
        transferred: outcome.transferred,
        failures: outcome.failures,
    })
}

/// Walk from the resolved root and enqueue every file; returns
/// `(folders visited, files enqueued)`.
async fn enqueue_tree<P: DriveApi + ?Sized>(
    drive: &P,
    spec: &RootSpec,
    resolved: &ResolvedRoot,
    queue: &WorkQueue<Task>,
    page_size: Option<u32>,
) -> Result<(usize, usize), MirrorError> {
    let lister = Lister::new(drive)
        .in_collection(resolved.collection_id.clone())
        .with_page_size(page_size);
    let mut walker = TreeWalker::start(lister, &resolved.folder_id, false).await?;

    let mut enqueued = 0;
    while let Some(visit) = walker.next().await? {
        for file in visit.files {
            queue.put(spec.task_for(&visit.path, file))?;
            enqueued += 1;
        }
    }
    Ok((walker.visited(), enqueued))
}
