#![allow(dead_code)]

//! In-memory stand-ins for the drive and the bucket, shared by the integration tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use gdrive_bucket_core::contract::{
    BucketStore, ChunkStream, Collection, DownloadKind, DownloadRequest, DriveApi, Entry,
    ListPage, ListRequest,
};
use gdrive_bucket_core::MirrorError;

pub const ROOT_ID: &str = "root";

#[derive(Default)]
struct DriveState {
    entries: HashMap<String, Entry>,
    children: HashMap<String, Vec<String>>,
    contents: HashMap<String, Vec<u8>>,
    collections: Vec<Collection>,
    failing_folders: HashSet<String>,
}

/// A drive tree held in memory. Listing honours the filter, sorts folders
/// first then by name, and pages through results with offset tokens.
#[derive(Clone)]
pub struct FakeDrive {
    state: Arc<Mutex<DriveState>>,
    default_page_size: usize,
    page_requests: Arc<AtomicUsize>,
    list_requests: Arc<Mutex<Vec<ListRequest>>>,
    downloads: Arc<Mutex<Vec<DownloadRequest>>>,
    chunk_size: usize,
}

impl FakeDrive {
    pub fn new(default_page_size: usize) -> Self {
        let drive = Self {
            state: Arc::new(Mutex::new(DriveState::default())),
            default_page_size,
            page_requests: Arc::new(AtomicUsize::new(0)),
            list_requests: Arc::new(Mutex::new(Vec::new())),
            downloads: Arc::new(Mutex::new(Vec::new())),
            chunk_size: 4,
        };
        drive.insert(Entry::folder(ROOT_ID, "My Drive"), None);
        drive
    }

    fn insert(&self, entry: Entry, parent: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = parent {
            state
                .children
                .entry(parent.to_string())
                .or_default()
                .push(entry.id.clone());
        }
        state.entries.insert(entry.id.clone(), entry);
    }

    pub fn add_folder(&self, id: &str, name: &str, parent: &str) -> &Self {
        self.insert(Entry::folder(id, name), Some(parent));
        self
    }

    pub fn add_file(&self, id: &str, name: &str, mime_type: &str, parent: &str) -> &Self {
        self.insert(Entry::new(id, name, mime_type), Some(parent));
        self.state
            .lock()
            .unwrap()
            .contents
            .insert(id.to_string(), format!("contents of {id}").into_bytes());
        self
    }

    pub fn add_collection(&self, id: &str, name: &str) -> &Self {
        self.state.lock().unwrap().collections.push(Collection {
            id: id.to_string(),
            name: name.to_string(),
        });
        // A shared collection's root folder shares its id.
        self.insert(Entry::folder(id, name), None);
        self
    }

    /// Make listing the children of `folder_id` fail.
    pub fn fail_listing(&self, folder_id: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .failing_folders
            .insert(folder_id.to_string());
        self
    }

    pub fn content_of(&self, id: &str) -> Vec<u8> {
        self.state.lock().unwrap().contents[id].clone()
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    pub fn list_requests(&self) -> Vec<ListRequest> {
        self.list_requests.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<DownloadRequest> {
        self.downloads.lock().unwrap().clone()
    }

    /// Build a uniform tree under `parent`: every folder down to `depth`
    /// gets `fan_out` sub-folders and `fan_out` plain files. Returns the
    /// number of folders created, including none for `parent` itself.
    pub fn grow_tree(&self, parent: &str, depth: usize, fan_out: usize) -> usize {
        let mut created = 0;
        for i in 0..fan_out {
            self.add_file(&format!("{parent}-f{i}"), &format!("file{i}.txt"), "text/plain", parent);
        }
        if depth == 0 {
            return created;
        }
        for i in 0..fan_out {
            let id = format!("{parent}-d{i}");
            self.add_folder(&id, &format!("dir{i}"), parent);
            created += 1 + self.grow_tree(&id, depth - 1, fan_out);
        }
        created
    }

    /// Children of `parent` in listing order (folders first, then by name).
    pub fn sorted_children(&self, parent: &str) -> Vec<Entry> {
        let state = self.state.lock().unwrap();
        let mut children: Vec<Entry> = state
            .children
            .get(parent)
            .map(|ids| ids.iter().map(|id| state.entries[id].clone()).collect())
            .unwrap_or_default();
        children.sort_by(|a, b| (!a.is_folder(), &a.name).cmp(&(!b.is_folder(), &b.name)));
        children
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage, MirrorError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        self.list_requests.lock().unwrap().push(request.clone());

        let filter = &request.filter;
        let candidates = match &filter.parent {
            Some(parent) => {
                if self.state.lock().unwrap().failing_folders.contains(parent) {
                    return Err(MirrorError::RemoteStatus {
                        status: 500,
                        body: format!("listing {parent} failed"),
                    });
                }
                self.sorted_children(parent)
            }
            None => {
                let state = self.state.lock().unwrap();
                let mut all: Vec<Entry> = state.entries.values().cloned().collect();
                all.sort_by(|a, b| (!a.is_folder(), &a.name, &a.id).cmp(&(!b.is_folder(), &b.name, &b.id)));
                all
            }
        };
        let matching: Vec<Entry> = candidates
            .into_iter()
            .filter(|e| filter.name.as_ref().map_or(true, |name| &e.name == name))
            .filter(|e| filter.is_folder.map_or(true, |want| e.is_folder() == want))
            .collect();

        let page_size = request
            .page_size
            .map(|size| size as usize)
            .unwrap_or(self.default_page_size)
            .max(1);
        let offset: usize = request
            .page_token
            .as_deref()
            .map(|token| token.parse().expect("offset token"))
            .unwrap_or(0);
        let end = (offset + page_size).min(matching.len());
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(ListPage {
            entries: matching[offset.min(end)..end].to_vec(),
            next_page_token,
        })
    }

    async fn get_entry(&self, id: &str, _shared: bool) -> Result<Entry, MirrorError> {
        self.state
            .lock()
            .unwrap()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| MirrorError::RemoteStatus {
                status: 404,
                body: format!("File not found: {id}"),
            })
    }

    async fn list_collections(&self, query: &str) -> Result<Vec<Collection>, MirrorError> {
        let collections = self.state.lock().unwrap().collections.clone();
        // Loose server-side match: anything whose name appears in the query.
        Ok(collections
            .into_iter()
            .filter(|c| query.contains(&c.name.replace('\'', "\\'")))
            .collect())
    }

    async fn download(&self, request: &DownloadRequest) -> Result<ChunkStream, MirrorError> {
        self.downloads.lock().unwrap().push(request.clone());
        let mut content = self
            .state
            .lock()
            .unwrap()
            .contents
            .get(&request.file_id)
            .cloned()
            .ok_or_else(|| MirrorError::RemoteStatus {
                status: 404,
                body: format!("File not found: {}", request.file_id),
            })?;
        if let DownloadKind::Export { export_mime_type } = &request.kind {
            content.extend_from_slice(format!(" as {export_mime_type}").as_bytes());
        }
        let chunks: Vec<Result<Vec<u8>, MirrorError>> = content
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub upload_content_type: String,
    pub content_type: Option<String>,
    pub scratch_path: PathBuf,
}

/// Records every upload and metadata patch. Uploads read the scratch file
/// at call time, so the recorded bytes are exactly what the pipeline wrote.
#[derive(Clone, Default)]
pub struct RecordingBucket {
    objects: Arc<Mutex<Vec<StoredObject>>>,
    failing_keys: Arc<Mutex<HashSet<String>>>,
    upload_delay: Option<Duration>,
}

impl RecordingBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload_delay(delay: Duration) -> Self {
        Self {
            upload_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_key(&self, key: &str) -> &Self {
        self.failing_keys.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects().into_iter().find(|o| o.key == key)
    }
}

#[async_trait]
impl BucketStore for RecordingBucket {
    fn bucket_name(&self) -> String {
        "test-bucket".to_string()
    }

    async fn upload_file(&self, key: &str, source: &Path, content_type: &str) -> Result<(), MirrorError> {
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(MirrorError::RemoteStatus {
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        let bytes = tokio::fs::read(source).await?;
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            bytes,
            upload_content_type: content_type.to_string(),
            content_type: None,
            scratch_path: source.to_path_buf(),
        });
        Ok(())
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), MirrorError> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .iter_mut()
            .rev()
            .find(|o| o.key == key)
            .ok_or_else(|| MirrorError::RemoteStatus {
                status: 404,
                body: format!("No such object: {key}"),
            })?;
        object.content_type = Some(content_type.to_string());
        Ok(())
    }
}
