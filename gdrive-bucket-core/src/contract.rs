#![allow(unused)]

//! # contract: data model and service seams
//!
//! This module defines the typed records that flow through a mirror run and the
//! two traits the core talks to the outside world through:
//!
//! - [`DriveApi`]: the source file-storage service (listing, metadata, download).
//! - [`BucketStore`]: the destination object-storage bucket (upload, metadata patch).
//!
//! Remote records are parsed into [`Entry`] once, at the API boundary. Nothing past
//! that point reads loosely-typed JSON.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`, so tests can generate deterministic
//!   mocks (`MockDriveApi`, `MockBucketStore`).
//! - Concrete HTTP clients live in the CLI crate.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use mockall::{automock, predicate::*};

use crate::error::{FailureKind, MirrorError};
pub use crate::query::ListFilter;

/// MIME type the source service uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Listing order: folders before files, then by name, then by creation time.
pub const LIST_ORDER_BY: &str = "folder,name,createdTime";

/// One node of the source hierarchy, as returned by a listing or metadata call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl Entry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, FOLDER_MIME_TYPE)
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// A named shared collection (shared drive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// One page request against the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub filter: ListFilter,
    pub page_token: Option<String>,
    pub order_by: String,
    pub page_size: Option<u32>,
    /// Shared collection to scope the query to. `None` queries the default
    /// private collection.
    pub collection_id: Option<String>,
}

impl ListRequest {
    pub fn new(filter: ListFilter) -> Self {
        Self {
            filter,
            page_token: None,
            order_by: LIST_ORDER_BY.to_string(),
            page_size: None,
            collection_id: None,
        }
    }

    pub fn with_page_token(&self, token: String) -> Self {
        Self {
            page_token: Some(token),
            ..self.clone()
        }
    }
}

/// One page of listing results. `next_page_token` is absent on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default, rename = "files")]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// How a file's bytes are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadKind {
    /// Raw bytes as stored.
    Media,
    /// Server-side conversion of a proprietary document to `export_mime_type`.
    Export { export_mime_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub file_id: String,
    pub kind: DownloadKind,
}

/// Sequential content chunks; the end of the stream means no more chunks are pending.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, MirrorError>>;

/// A discovered file annotated with where it came from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub entry: Entry,
    /// Human-readable source path, e.g. `//My Drive/A/B/C.txt`.
    pub drive_path: String,
    /// Destination object key, e.g. `My Drive/A/B/C.txt`.
    pub bucket_path: String,
}

/// Outcome of one successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub file_id: String,
    pub drive_path: String,
    pub bucket_path: String,
    pub content_type: String,
    pub bytes: u64,
}

/// Outcome of one failed transfer. The task is dropped; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub file_id: String,
    pub drive_path: String,
    pub bucket_path: String,
    pub kind: FailureKind,
    pub error: String,
}

impl FailureRecord {
    pub fn new(task: &Task, error: &MirrorError) -> Self {
        Self {
            file_id: task.entry.id.clone(),
            drive_path: task.drive_path.clone(),
            bucket_path: task.bucket_path.clone(),
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}

/// Source file-storage service.
///
/// Implementations are not required to be safe for unsynchronised sharing
/// between workers; every worker builds its own instance.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Fetch one page of entries matching the request's filter.
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage, MirrorError>;

    /// Fetch a single entry's metadata. `shared` must be set when the entry
    /// lives in a shared collection.
    async fn get_entry(&self, id: &str, shared: bool) -> Result<Entry, MirrorError>;

    /// List shared collections matching a rendered query, following pagination.
    async fn list_collections(&self, query: &str) -> Result<Vec<Collection>, MirrorError>;

    /// Open a chunked download of a file, either raw or export-converted.
    async fn download(&self, request: &DownloadRequest) -> Result<ChunkStream, MirrorError>;
}

/// Destination object-storage bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    fn bucket_name(&self) -> String;

    /// Create or overwrite the object at `key` with the full contents of `source`.
    async fn upload_file(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<(), MirrorError>;

    /// Persist `content_type` on an existing object.
    async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), MirrorError>;
}
