//! Drive v3 REST client implementing [`DriveApi`].

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use gdrive_bucket_core::contract::{
    ChunkStream, Collection, DownloadKind, DownloadRequest, DriveApi, Entry, ListPage, ListRequest,
};
use gdrive_bucket_core::MirrorError;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::http::{build_client, check_status, handle_json, parse_base, remote, Timeouts};

const FILE_FIELDS: &str = "id,name,mimeType";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";
const DRIVES_PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrivesPage {
    #[serde(default)]
    drives: Vec<Collection>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn with_base_url(base_url: &str, token: impl Into<String>, timeouts: Timeouts) -> Result<Self, MirrorError> {
        Ok(Self {
            http: build_client(timeouts, true)?,
            base_url: parse_base(base_url)?,
            token: token.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, MirrorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MirrorError::Remote(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["drive", "v3"])
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, MirrorError> {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(remote)
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage, MirrorError> {
        let mut url = self.endpoint(&["files"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &request.filter.to_query())
                .append_pair("fields", LIST_FIELDS)
                .append_pair("orderBy", &request.order_by);
            if let Some(page_size) = request.page_size {
                query.append_pair("pageSize", &page_size.to_string());
            }
            if let Some(token) = &request.page_token {
                query.append_pair("pageToken", token);
            }
            if let Some(drive_id) = &request.collection_id {
                query
                    .append_pair("driveId", drive_id)
                    .append_pair("corpora", "drive")
                    .append_pair("includeItemsFromAllDrives", "true")
                    .append_pair("supportsAllDrives", "true");
            }
        }
        let response = self.get(url).await?;
        handle_json(response).await
    }

    async fn get_entry(&self, id: &str, shared: bool) -> Result<Entry, MirrorError> {
        let mut url = self.endpoint(&["files", id])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fields", FILE_FIELDS);
            if shared {
                query.append_pair("supportsAllDrives", "true");
            }
        }
        let response = self.get(url).await?;
        handle_json(response).await
    }

    async fn list_collections(&self, query: &str) -> Result<Vec<Collection>, MirrorError> {
        let mut collections = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.endpoint(&["drives"])?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", query)
                    .append_pair("pageSize", DRIVES_PAGE_SIZE);
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }
            let page: DrivesPage = handle_json(self.get(url).await?).await?;
            collections.extend(page.drives);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!(query, found = collections.len(), "Listed shared collections");
        Ok(collections)
    }

    async fn download(&self, request: &DownloadRequest) -> Result<ChunkStream, MirrorError> {
        let url = match &request.kind {
            DownloadKind::Media => {
                let mut url = self.endpoint(&["files", request.file_id.as_str()])?;
                url.query_pairs_mut()
                    .append_pair("alt", "media")
                    .append_pair("supportsAllDrives", "true");
                url
            }
            DownloadKind::Export { export_mime_type } => {
                let mut url = self.endpoint(&["files", request.file_id.as_str(), "export"])?;
                url.query_pairs_mut().append_pair("mimeType", export_mime_type);
                url
            }
        };
        let response = check_status(self.get(url).await?).await?;
        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(remote)
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_under_base_path() {
        let client = DriveClient::with_base_url("http://localhost:1234/", "t", Timeouts::default()).unwrap();
        let url = client.endpoint(&["files", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/drive/v3/files/a%20b%2Fc");
    }
}
