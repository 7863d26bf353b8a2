/// `load_config` module: loads the optional YAML tuning file into [`Tuning`].
///
/// This module is the only place where user-supplied YAML is parsed. Every key is
/// optional; anything left out keeps its default.
///
/// # Accepted keys
/// - `drain_threshold`, `poll_interval_secs`: progress monitor while workers drain
/// - `upload_chunk_size`: bytes per resumable-upload request (rounded up to 256 KiB)
/// - `connect_timeout_secs`, `read_timeout_secs`: HTTP timeouts
/// - `page_size`: listing page size; unset lets the server choose
///
/// # Errors
/// Failures surface as `anyhow::Error` with the file path in the message.
use anyhow::Result;
use gdrive_bucket_core::config::Tuning;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Tuning> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading tuning from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is valid and means "all defaults".
    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(Tuning::default());
    }

    let tuning: Tuning = match serde_yaml::from_str(&config_content) {
        Ok(tuning) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            tuning
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if tuning.aligned_chunk_size() != tuning.upload_chunk_size {
        warn!(
            requested = tuning.upload_chunk_size,
            effective = tuning.aligned_chunk_size(),
            "upload_chunk_size rounded up to a multiple of 256 KiB"
        );
    }
    Ok(tuning)
}
