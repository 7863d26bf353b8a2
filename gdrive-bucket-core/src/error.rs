//! Error taxonomy shared by every stage of a mirror run.
//!
//! Resolution-time variants (`NotAFolder`, `PathNotFound`, `CollectionNotFound`,
//! `AmbiguousCollection`, `AmbiguousRoot`, `InvalidRootSpec`) abort a run before
//! any work is queued. Everything raised while transferring a single file is
//! turned into a [`FailureRecord`](crate::contract::FailureRecord) by the worker
//! that hit it.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("remote request failed: {0}")]
    Remote(String),
    #[error("remote returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },
    #[error("no export format for proprietary type {mime_type}")]
    UnsupportedFormat { mime_type: String },
    #[error("not a folder: {name} ({id}, {mime_type})")]
    NotAFolder {
        id: String,
        name: String,
        mime_type: String,
    },
    #[error("folder '{segment}' not found under {parent}")]
    PathNotFound { segment: String, parent: String },
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),
    #[error("collection name '{name}' is ambiguous ({count} matches)")]
    AmbiguousCollection { name: String, count: usize },
    #[error("root folder name '{name}' is ambiguous ({count} matches)")]
    AmbiguousRoot { name: String, count: usize },
    #[error("invalid root spec '{0}'")]
    InvalidRootSpec(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("work queue is closed")]
    QueueClosed,
    #[error("no transfer worker could start: {0}")]
    NoWorkers(String),
    #[error("transfer panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

/// Coarse category stored on a failure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Remote,
    UnsupportedFormat,
    Io,
    Other,
}

impl MirrorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            MirrorError::Remote(_) | MirrorError::RemoteStatus { .. } => FailureKind::Remote,
            MirrorError::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
            MirrorError::Io(_) => FailureKind::Io,
            _ => FailureKind::Other,
        }
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            MirrorError::RemoteStatus { status, .. } => Some(classify_status(*status)),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed. Nothing retries today; this
    /// only feeds the failure log.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        ) || matches!(self, MirrorError::Remote(_))
    }
}

fn classify_status(status: u16) -> ApiErrorClass {
    match status {
        401 | 403 => ApiErrorClass::Auth,
        429 => ApiErrorClass::RateLimit,
        408 | 409 | 425 => ApiErrorClass::Transient,
        s if s >= 500 => ApiErrorClass::Transient,
        _ => ApiErrorClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_matches_http_semantics() {
        let err = |status| MirrorError::RemoteStatus {
            status,
            body: String::new(),
        };
        assert_eq!(err(403).classification(), Some(ApiErrorClass::Auth));
        assert_eq!(err(429).classification(), Some(ApiErrorClass::RateLimit));
        assert_eq!(err(503).classification(), Some(ApiErrorClass::Transient));
        assert_eq!(err(404).classification(), Some(ApiErrorClass::Permanent));
        assert!(err(500).is_transient());
        assert!(!err(404).is_transient());
    }

    #[test]
    fn kinds_group_variants_for_reporting() {
        assert_eq!(
            MirrorError::UnsupportedFormat {
                mime_type: "application/vnd.google-apps.form".into()
            }
            .kind(),
            FailureKind::UnsupportedFormat
        );
        assert_eq!(MirrorError::Remote("reset".into()).kind(), FailureKind::Remote);
        assert_eq!(MirrorError::QueueClosed.kind(), FailureKind::Other);
    }
}
