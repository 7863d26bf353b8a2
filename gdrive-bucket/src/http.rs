//! Pieces shared by the Drive and Storage clients.

use std::time::Duration;

use gdrive_bucket_core::MirrorError;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use url::Url;

/// Timeouts applied to every request a client makes.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(900),
        }
    }
}

/// Resumable upload sessions answer `308` without a `Location`; those
/// clients pass `follow_redirects = false` so the status reaches the caller.
pub fn build_client(timeouts: Timeouts, follow_redirects: bool) -> Result<Client, MirrorError> {
    let redirect = if follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    Client::builder()
        .connect_timeout(timeouts.connect)
        .read_timeout(timeouts.read)
        .redirect(redirect)
        .build()
        .map_err(remote)
}

pub fn parse_base(base_url: &str) -> Result<Url, MirrorError> {
    Url::parse(base_url).map_err(|e| MirrorError::Remote(format!("invalid url {base_url}: {e}")))
}

pub fn remote(error: reqwest::Error) -> MirrorError {
    MirrorError::Remote(error.to_string())
}

/// Pass 2xx responses through; turn anything else into `RemoteStatus`.
pub async fn check_status(response: Response) -> Result<Response, MirrorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MirrorError::RemoteStatus {
        status: status.as_u16(),
        body,
    })
}

pub async fn handle_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, MirrorError> {
    check_status(response).await?.json::<T>().await.map_err(remote)
}
