//! Access tokens and API endpoints, read from the environment.
//!
//! Tokens are plain OAuth bearer tokens obtained out of band (for example with
//! `gcloud auth print-access-token`). Refreshing them is the caller's job.

use std::env;
use std::fmt;

use anyhow::{anyhow, Result};

pub const DRIVE_TOKEN_ENV: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";
pub const STORAGE_TOKEN_ENV: &str = "GOOGLE_STORAGE_ACCESS_TOKEN";
/// Used for either service when its own variable is unset.
pub const SHARED_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

pub const DRIVE_BASE_ENV: &str = "GDRIVE_API_BASE";
pub const STORAGE_BASE_ENV: &str = "GCS_API_BASE";

pub const DEFAULT_DRIVE_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_STORAGE_BASE: &str = "https://storage.googleapis.com";

#[derive(Clone)]
pub struct Credentials {
    pub drive_token: String,
    pub storage_token: String,
    pub drive_base: String,
    pub storage_base: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("drive_token", &"<redacted>")
            .field("storage_token", &"<redacted>")
            .field("drive_base", &self.drive_base)
            .field("storage_base", &self.storage_base)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let drive_token = token_from_env(DRIVE_TOKEN_ENV)?;
        let storage_token = token_from_env(STORAGE_TOKEN_ENV)?;
        let drive_base = non_empty_var(DRIVE_BASE_ENV).unwrap_or_else(|| DEFAULT_DRIVE_BASE.to_string());
        let storage_base =
            non_empty_var(STORAGE_BASE_ENV).unwrap_or_else(|| DEFAULT_STORAGE_BASE.to_string());

        tracing::info!(
            drive_base = %drive_base,
            storage_base = %storage_base,
            "Loaded credentials from environment"
        );
        Ok(Self {
            drive_token,
            storage_token,
            drive_base,
            storage_base,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn token_from_env(name: &str) -> Result<String> {
    if let Some(token) = non_empty_var(name) {
        return Ok(token);
    }
    match non_empty_var(SHARED_TOKEN_ENV) {
        Some(token) => {
            tracing::debug!(variable = name, fallback = SHARED_TOKEN_ENV, "Using shared access token");
            Ok(token)
        }
        None => {
            tracing::error!(variable = name, "Access token missing in environment");
            Err(anyhow!("{name} (or {SHARED_TOKEN_ENV}) must be set"))
        }
    }
}
