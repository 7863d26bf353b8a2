//! Per-file pipeline: download (exporting proprietary formats) into a scoped
//! temporary file, upload it, then persist the resolved content type.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::contract::{BucketStore, DownloadKind, DownloadRequest, DriveApi, Task, TransferReport};
use crate::error::MirrorError;

/// Marker shared by every proprietary document type.
const PROPRIETARY_MARKER: &str = ".google-apps.";

const EXPORT_FORMATS: &[(&str, &str)] = &[
    (
        "application/vnd.google-apps.document",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("application/vnd.google-apps.drawing", "image/png"),
    (
        "application/vnd.google-apps.presentation",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    (
        "application/vnd.google-apps.spreadsheet",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "application/vnd.google-apps.script",
        "application/vnd.google-apps.script+json",
    ),
];

pub fn is_proprietary(mime_type: &str) -> bool {
    mime_type.contains(PROPRIETARY_MARKER)
}

/// Export target for a proprietary type, if the table has one.
pub fn export_mime_type(mime_type: &str) -> Option<&'static str> {
    EXPORT_FORMATS
        .iter()
        .find(|(source, _)| *source == mime_type)
        .map(|(_, target)| *target)
}

/// Decide how a file is fetched and which content type the destination gets.
pub fn plan_download(file_id: &str, mime_type: &str) -> Result<(DownloadRequest, String), MirrorError> {
    if !is_proprietary(mime_type) {
        let request = DownloadRequest {
            file_id: file_id.to_string(),
            kind: DownloadKind::Media,
        };
        return Ok((request, mime_type.to_string()));
    }

    let target = export_mime_type(mime_type).ok_or_else(|| MirrorError::UnsupportedFormat {
        mime_type: mime_type.to_string(),
    })?;
    let request = DownloadRequest {
        file_id: file_id.to_string(),
        kind: DownloadKind::Export {
            export_mime_type: target.to_string(),
        },
    };
    Ok((request, target.to_string()))
}

/// Copy one file from the drive to the bucket.
///
/// The temporary file is removed when this returns, on success or failure.
pub async fn transfer<D, B>(task: &Task, drive: &D, bucket: &B) -> Result<TransferReport, MirrorError>
where
    D: DriveApi + ?Sized,
    B: BucketStore + ?Sized,
{
    let (request, content_type) = plan_download(&task.entry.id, &task.entry.mime_type)?;

    let (scratch, handle) = tokio::task::spawn_blocking(|| -> std::io::Result<_> {
        let scratch = tempfile::NamedTempFile::new()?;
        let handle = scratch.as_file().try_clone()?;
        Ok((scratch, handle))
    })
    .await
    .map_err(|e| MirrorError::Panicked(format!("creating scratch file: {e}")))??;
    let mut file = tokio::fs::File::from_std(handle);

    let mut chunks = drive.download(&request).await?;
    let mut bytes: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);
    debug!(file_id = %task.entry.id, bytes, "Downloaded to scratch file");

    bucket
        .upload_file(&task.bucket_path, scratch.path(), &content_type)
        .await?;
    bucket
        .set_content_type(&task.bucket_path, &content_type)
        .await?;

    info!(
        file_id = %task.entry.id,
        bytes,
        content_type = %content_type,
        "Copied: {} {} => gs://{}/{}",
        task.entry.id,
        task.drive_path,
        bucket.bucket_name(),
        task.bucket_path
    );

    Ok(TransferReport {
        file_id: task.entry.id.clone(),
        drive_path: task.drive_path.clone(),
        bucket_path: task.bucket_path.clone(),
        content_type,
        bytes,
    })
}
