//! Cloud Storage JSON API client implementing [`BucketStore`] with resumable,
//! chunked uploads.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use gdrive_bucket_core::contract::BucketStore;
use gdrive_bucket_core::MirrorError;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};
use url::Url;

use crate::http::{build_client, check_status, parse_base, remote, Timeouts};

const USER_PROJECT_HEADER: &str = "x-goog-user-project";
const UPLOAD_CONTENT_TYPE_HEADER: &str = "x-upload-content-type";
const UPLOAD_CONTENT_LENGTH_HEADER: &str = "x-upload-content-length";
/// "Resume Incomplete": the session wants more bytes.
const RESUME_INCOMPLETE: u16 = 308;
/// Consecutive chunks the session may decline to persist before the upload is abandoned.
const MAX_STALLED_CHUNKS: u32 = 3;

#[derive(Clone)]
pub struct GcsBucket {
    http: Client,
    base_url: Url,
    token: String,
    project: String,
    bucket: String,
    chunk_size: usize,
}

impl GcsBucket {
    pub fn with_base_url(
        base_url: &str,
        token: impl Into<String>,
        project: impl Into<String>,
        bucket: impl Into<String>,
        chunk_size: usize,
        timeouts: Timeouts,
    ) -> Result<Self, MirrorError> {
        Ok(Self {
            http: build_client(timeouts, false)?,
            base_url: parse_base(base_url)?,
            token: token.into(),
            project: project.into(),
            bucket: bucket.into(),
            chunk_size: chunk_size.max(1),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, MirrorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MirrorError::Remote(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Open a resumable session and return its upload URL.
    async fn start_session(&self, key: &str, content_type: &str, total: u64) -> Result<Url, MirrorError> {
        let mut url = self.endpoint(&["upload", "storage", "v1", "b", self.bucket.as_str(), "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "resumable")
            .append_pair("name", key);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(USER_PROJECT_HEADER, self.project.as_str())
            .header(UPLOAD_CONTENT_TYPE_HEADER, content_type)
            .header(UPLOAD_CONTENT_LENGTH_HEADER, total.to_string())
            .json(&json!({ "name": key, "contentType": content_type }))
            .send()
            .await
            .map_err(remote)?;
        let response = check_status(response).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| MirrorError::Remote("resumable session response has no Location header".into()))?;
        Url::parse(location).map_err(|e| MirrorError::Remote(format!("invalid session url {location}: {e}")))
    }

    async fn put_chunk(&self, session: &Url, body: Vec<u8>, content_range: String) -> Result<Response, MirrorError> {
        self.http
            .put(session.clone())
            .bearer_auth(&self.token)
            .header(CONTENT_RANGE, content_range)
            .body(body)
            .send()
            .await
            .map_err(remote)
    }
}

/// Last byte the server has persisted, from a `Range: bytes=0-N` header.
fn persisted_end(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .parse()
        .ok()
}

async fn read_chunk(file: &mut tokio::fs::File, limit: usize) -> Result<Vec<u8>, MirrorError> {
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

#[async_trait]
impl BucketStore for GcsBucket {
    fn bucket_name(&self) -> String {
        self.bucket.clone()
    }

    async fn upload_file(&self, key: &str, source: &Path, content_type: &str) -> Result<(), MirrorError> {
        let mut file = tokio::fs::File::open(source).await?;
        let total = file.metadata().await?.len();
        let session = self.start_session(key, content_type, total).await?;

        if total == 0 {
            let response = self.put_chunk(&session, Vec::new(), "bytes */0".to_string()).await?;
            check_status(response).await?;
            return Ok(());
        }

        let mut offset: u64 = 0;
        let mut stalled = 0;
        loop {
            let chunk = read_chunk(&mut file, self.chunk_size).await?;
            if chunk.is_empty() {
                return Err(MirrorError::Remote(format!(
                    "upload of {key} ended at byte {offset} of {total} without completing"
                )));
            }
            let end = offset + chunk.len() as u64 - 1;
            let sent = chunk.len() as u64;
            let response = self
                .put_chunk(&session, chunk, format!("bytes {offset}-{end}/{total}"))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    debug!(key, bytes = total, "Resumable upload finished");
                    return Ok(());
                }
                status if status.as_u16() == RESUME_INCOMPLETE => {
                    // No Range header means nothing has been persisted yet.
                    let next = persisted_end(&response).map_or(0, |last| last + 1);
                    if next <= offset {
                        stalled += 1;
                        if stalled >= MAX_STALLED_CHUNKS {
                            return Err(MirrorError::Remote(format!(
                                "upload of {key} made no progress past byte {next} after {stalled} attempts"
                            )));
                        }
                        warn!(key, offset, resume_at = next, "Upload session did not persist the last chunk");
                    } else {
                        stalled = 0;
                    }
                    if next != offset + sent {
                        file.seek(SeekFrom::Start(next)).await?;
                    }
                    offset = next;
                }
                _ => {
                    check_status(response).await?;
                    return Err(MirrorError::Remote(format!(
                        "unexpected response while uploading {key}"
                    )));
                }
            }
        }
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), MirrorError> {
        let url = self.endpoint(&["storage", "v1", "b", self.bucket.as_str(), "o", key])?;
        let response = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .header(USER_PROJECT_HEADER, self.project.as_str())
            .json(&json!({ "contentType": content_type }))
            .send()
            .await
            .map_err(remote)?;
        check_status(response).await?;
        Ok(())
    }
}
