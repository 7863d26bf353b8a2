use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default number of concurrent transfer workers.
pub const DEFAULT_WORKERS: usize = 8;

/// Default root spec: the whole private collection.
pub const DEFAULT_ROOT: &str = "//My Drive/";

/// Upload chunks must be a multiple of this many bytes for resumable uploads.
pub const UPLOAD_CHUNK_ALIGNMENT: usize = 256 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Cloud project that owns the destination bucket.
    pub project: String,
    /// Root spec of the tree to mirror, `//<Collection>/<path>`.
    pub root: String,
    pub bucket: String,
    pub workers: usize,
    #[serde(default)]
    pub tuning: Tuning,
}

impl MirrorConfig {
    pub fn new(project: impl Into<String>, root: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            root: root.into(),
            bucket: bucket.into(),
            workers: DEFAULT_WORKERS,
            tuning: Tuning::default(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            project = %self.project,
            root = %self.root,
            bucket = %self.bucket,
            workers = self.workers,
            "Loaded MirrorConfig"
        );
        debug!(?self, "MirrorConfig loaded (full debug)");
    }
}

/// Knobs with sensible defaults; every field may be omitted in a tuning file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Queue length below which the producer stops waiting and shuts down.
    pub drain_threshold: usize,
    pub poll_interval_secs: u64,
    pub upload_chunk_size: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub page_size: Option<u32>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            drain_threshold: 5,
            poll_interval_secs: 10,
            upload_chunk_size: 10 * 1024 * 1024,
            connect_timeout_secs: 10,
            read_timeout_secs: 900,
            page_size: None,
        }
    }
}

impl Tuning {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Configured chunk size rounded up to the resumable-upload alignment.
    pub fn aligned_chunk_size(&self) -> usize {
        let chunk = self.upload_chunk_size.max(1);
        chunk.div_ceil(UPLOAD_CHUNK_ALIGNMENT) * UPLOAD_CHUNK_ALIGNMENT
    }
}
