//! Depth-first folder traversal driven by an explicit stack.
//!
//! Each call to [`TreeWalker::next`] pops one folder, lists its children (one
//! paginated listing round) and yields them split into folders and files. Child
//! folders are pushed in reverse so they pop in listing order, which makes the
//! visit order identical to recursive pre-order without growing the call stack.

use futures::stream::{self, Stream};
use tracing::debug;

use crate::contract::{DriveApi, Entry, ListFilter};
use crate::error::MirrorError;
use crate::lister::Lister;

/// One visited folder and its direct children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderVisit {
    /// Names from the traversal root (inclusive) down to this folder.
    pub path: Vec<String>,
    pub folder: Entry,
    pub folders: Vec<Entry>,
    pub files: Vec<Entry>,
}

pub struct TreeWalker<'a, D: ?Sized> {
    lister: Lister<'a, D>,
    stack: Vec<(Vec<String>, Entry)>,
    visited: usize,
}

impl<'a, D: DriveApi + ?Sized> TreeWalker<'a, D> {
    /// Resolve `root` and seed the stack with it.
    ///
    /// With `by_name`, `root` is a folder name that must match exactly one
    /// folder; otherwise it is an entry id whose metadata is fetched and
    /// checked to be a folder.
    pub async fn start(lister: Lister<'a, D>, root: &str, by_name: bool) -> Result<Self, MirrorError> {
        let top = if by_name {
            let mut matches = lister.collect(ListFilter::new().name(root).folders_only()).await?;
            match matches.len() {
                0 => {
                    return Err(MirrorError::PathNotFound {
                        segment: root.to_string(),
                        parent: lister.collection_id().unwrap_or("root").to_string(),
                    })
                }
                1 => matches.remove(0),
                count => {
                    return Err(MirrorError::AmbiguousRoot {
                        name: root.to_string(),
                        count,
                    })
                }
            }
        } else {
            lister
                .drive()
                .get_entry(root, lister.collection_id().is_some())
                .await?
        };

        if !top.is_folder() {
            return Err(MirrorError::NotAFolder {
                id: top.id,
                name: top.name,
                mime_type: top.mime_type,
            });
        }

        Ok(Self {
            lister,
            stack: vec![(vec![top.name.clone()], top)],
            visited: 0,
        })
    }

    /// Visit the next folder, or `None` once the tree is exhausted.
    pub async fn next(&mut self) -> Result<Option<FolderVisit>, MirrorError> {
        let Some((path, folder)) = self.stack.pop() else {
            return Ok(None);
        };

        let (folders, files): (Vec<Entry>, Vec<Entry>) = self
            .lister
            .collect(ListFilter::children_of(folder.id.clone()))
            .await?
            .into_iter()
            .partition(Entry::is_folder);

        self.stack.extend(folders.iter().rev().map(|child| {
            let mut child_path = path.clone();
            child_path.push(child.name.clone());
            (child_path, child.clone())
        }));
        self.visited += 1;

        debug!(
            path = %path.join("/"),
            folders = folders.len(),
            files = files.len(),
            pending = self.stack.len(),
            "Visited folder"
        );

        Ok(Some(FolderVisit {
            path,
            folder,
            folders,
            files,
        }))
    }

    /// Folders yielded so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Folders discovered but not yet expanded.
    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    /// The remaining traversal as a stream of visits.
    pub fn into_stream(self) -> impl Stream<Item = Result<FolderVisit, MirrorError>> + 'a {
        stream::try_unfold(self, |mut walker| async move {
            let visit = walker.next().await?;
            Ok::<_, MirrorError>(visit.map(|visit| (visit, walker)))
        })
    }
}
