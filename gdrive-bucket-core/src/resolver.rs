//! Root-spec parsing and resolution to a starting folder.
//!
//! A root spec has the form `//<CollectionName>/<segment>/<segment>/...`. A bare
//! path without the leading `//` is taken relative to the private collection.

use std::sync::OnceLock;

use futures::stream::TryStreamExt;
use regex::Regex;
use tracing::{info, warn};

use crate::contract::{DriveApi, Entry, ListFilter, Task};
use crate::error::MirrorError;
use crate::lister::Lister;
use crate::query::escape_query_value;

/// Display name of the private collection.
pub const DEFAULT_COLLECTION: &str = "My Drive";

/// Identifier of the private collection's root folder.
pub const DEFAULT_ROOT_ID: &str = "root";

fn root_spec_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^//([^/]+)(?:/(.*))?$").expect("root spec pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub collection: String,
    pub segments: Vec<String>,
}

impl RootSpec {
    pub fn parse(raw: &str) -> Result<Self, MirrorError> {
        let normalized = if raw.starts_with("//") {
            raw.to_string()
        } else {
            let relative = raw.trim_start_matches('/');
            let assumed = format!("//{DEFAULT_COLLECTION}/{relative}");
            info!(given = raw, assumed = %assumed, "Assuming the private collection");
            assumed
        };

        let captures = root_spec_pattern()
            .captures(&normalized)
            .ok_or_else(|| MirrorError::InvalidRootSpec(raw.to_string()))?;
        let collection = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MirrorError::InvalidRootSpec(raw.to_string()))?;
        let segments = captures
            .get(2)
            .map(|m| {
                m.as_str()
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            collection,
            segments,
        })
    }

    pub fn is_default_collection(&self) -> bool {
        self.collection.trim().eq_ignore_ascii_case(DEFAULT_COLLECTION)
    }

    /// Canonical `//Collection/a/b` form, without a trailing slash.
    pub fn display(&self) -> String {
        let mut out = format!("//{}", self.collection);
        for segment in &self.segments {
            out.push('/');
            out.push_str(segment);
        }
        out
    }

    /// Annotate a discovered file with its source path and destination key.
    ///
    /// `walk_path` is the traversal path of the folder holding `entry`; its
    /// first element is the resolved root folder itself and is not repeated.
    pub fn task_for(&self, walk_path: &[String], entry: Entry) -> Task {
        let mut parts: Vec<&str> = Vec::with_capacity(1 + self.segments.len() + walk_path.len());
        parts.push(&self.collection);
        parts.extend(self.segments.iter().map(String::as_str));
        parts.extend(walk_path.iter().skip(1).map(String::as_str));
        parts.push(&entry.name);

        let bucket_path = parts.join("/");
        let drive_path = format!("//{bucket_path}");
        Task {
            entry,
            drive_path,
            bucket_path,
        }
    }
}

/// The starting point of a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoot {
    pub folder_id: String,
    /// Set when the root lives in a shared collection.
    pub collection_id: Option<String>,
}

/// Resolve a root spec to a folder id, one segment at a time.
pub async fn resolve<D: DriveApi + ?Sized>(
    drive: &D,
    spec: &RootSpec,
    page_size: Option<u32>,
) -> Result<ResolvedRoot, MirrorError> {
    let collection_id = if spec.is_default_collection() {
        None
    } else {
        Some(lookup_collection(drive, &spec.collection).await?)
    };

    let lister = Lister::new(drive)
        .in_collection(collection_id.clone())
        .with_page_size(page_size);

    // The root folder of a shared collection shares the collection's id.
    let mut parent = collection_id
        .clone()
        .unwrap_or_else(|| DEFAULT_ROOT_ID.to_string());

    for segment in &spec.segments {
        let filter = ListFilter::children_of(parent.clone())
            .name(segment.clone())
            .folders_only();
        let found = {
            let matches = lister.list(filter);
            futures::pin_mut!(matches);
            matches.try_next().await?
        };
        match found {
            Some(folder) => parent = folder.id,
            None => {
                return Err(MirrorError::PathNotFound {
                    segment: segment.clone(),
                    parent,
                })
            }
        }
    }

    info!(
        root = %spec.display(),
        folder_id = %parent,
        collection_id = collection_id.as_deref().unwrap_or("-"),
        "Resolved root folder"
    );
    Ok(ResolvedRoot {
        folder_id: parent,
        collection_id,
    })
}

async fn lookup_collection<D: DriveApi + ?Sized>(drive: &D, name: &str) -> Result<String, MirrorError> {
    let query = format!("name='{}'", escape_query_value(name));
    let mut collections = drive.list_collections(&query).await?;
    // Servers may match loosely; only exact names count.
    collections.retain(|c| c.name == name);
    match collections.len() {
        0 => Err(MirrorError::CollectionNotFound(name.to_string())),
        1 => Ok(collections.remove(0).id),
        count => {
            warn!(collection = name, count, "Collection name matches several shared drives");
            Err(MirrorError::AmbiguousCollection {
                name: name.to_string(),
                count,
            })
        }
    }
}
