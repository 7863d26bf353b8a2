//! Lazy, cursor-following listing over [`DriveApi::list_page`].

use futures::stream::{self, Stream, TryStreamExt};
use tracing::debug;

use crate::contract::{DriveApi, Entry, ListFilter, ListRequest};
use crate::error::MirrorError;

/// Wraps a drive handle with the scope every listing shares: the optional
/// shared collection and the requested page size.
pub struct Lister<'a, D: ?Sized> {
    drive: &'a D,
    collection_id: Option<String>,
    page_size: Option<u32>,
}

impl<'a, D: DriveApi + ?Sized> Lister<'a, D> {
    pub fn new(drive: &'a D) -> Self {
        Self {
            drive,
            collection_id: None,
            page_size: None,
        }
    }

    pub fn in_collection(mut self, collection_id: Option<String>) -> Self {
        self.collection_id = collection_id;
        self
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn drive(&self) -> &'a D {
        self.drive
    }

    pub fn collection_id(&self) -> Option<&str> {
        self.collection_id.as_deref()
    }

    fn request(&self, filter: ListFilter) -> ListRequest {
        ListRequest {
            page_size: self.page_size,
            collection_id: self.collection_id.clone(),
            ..ListRequest::new(filter)
        }
    }

    /// Every entry matching `filter`, page by page. A page is only requested
    /// once the previous one has been consumed, and the stream ends when a
    /// response carries no continuation token. Errors are not retried.
    pub fn list(&self, filter: ListFilter) -> impl Stream<Item = Result<Entry, MirrorError>> + 'a {
        let drive = self.drive;
        let first = self.request(filter);
        stream::try_unfold(Some(first), move |next| async move {
            let Some(request) = next else {
                return Ok::<_, MirrorError>(None);
            };
            let page = drive.list_page(&request).await?;
            debug!(
                entries = page.entries.len(),
                has_more = page.next_page_token.is_some(),
                query = %request.filter.to_query(),
                "Fetched listing page"
            );
            let next = page
                .next_page_token
                .map(|token| request.with_page_token(token));
            let entries = stream::iter(page.entries.into_iter().map(Ok::<Entry, MirrorError>));
            Ok(Some((entries, next)))
        })
        .try_flatten()
    }

    /// Convenience for callers that need the whole result set at once.
    pub async fn collect(&self, filter: ListFilter) -> Result<Vec<Entry>, MirrorError> {
        self.list(filter).try_collect().await
    }
}
