///
/// This module implements the CLI interface for gdrive-bucket: argument parsing,
/// wiring the concrete Drive and Storage clients into the core, and user-visible
/// output.
///
/// All traversal, queueing and transfer logic lives in the [`gdrive-bucket-core`] crate.
/// This module is strictly CLI glue.
///
/// ## How To Use
/// - From the shell: `gdrive-bucket -p <project> -b <bucket> -d '//My Drive/Photos'`.
/// - Programmatically (integration tests): call [`run`] with a constructed [`Cli`], or
///   [`mirror_to_bucket`] with an explicit config and credentials.
///
/// [`gdrive-bucket-core`]: ../../gdrive-bucket-core/
use crate::credentials::Credentials;
use crate::drive::DriveClient;
use crate::http::Timeouts;
use crate::load_config::load_config;
use crate::storage::GcsBucket;
use anyhow::{bail, Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use gdrive_bucket_core::config::{MirrorConfig, Tuning, DEFAULT_ROOT, DEFAULT_WORKERS};
use gdrive_bucket_core::mirror::{mirror, MirrorReport};
use gdrive_bucket_core::MirrorError;
use std::path::PathBuf;

/// Mirror a Google Drive folder tree into a Cloud Storage bucket.
#[derive(Parser, Debug)]
#[clap(
    name = "gdrive-bucket",
    version,
    about = "Copy every file under a Drive folder into a Cloud Storage bucket, preserving paths"
)]
pub struct Cli {
    /// Cloud project that owns the destination bucket
    #[clap(long, short = 'p')]
    pub project: String,

    /// Drive folder to copy, as //<Collection>/<path> (a bare path means My Drive)
    #[clap(long, short = 'd', default_value = DEFAULT_ROOT)]
    pub drive: String,

    /// Destination bucket name
    #[clap(long, short = 'b')]
    pub bucket: String,

    /// Number of concurrent transfer workers
    #[clap(
        long,
        short = 'w',
        default_value_t = DEFAULT_WORKERS,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub workers: usize,

    /// Optional YAML tuning file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Write the run report as JSON to this path
    #[clap(long)]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn to_config(&self) -> Result<MirrorConfig> {
        let tuning = match &self.config {
            Some(path) => load_config(path)?,
            None => Tuning::default(),
        };
        let mut config = MirrorConfig::new(&self.project, &self.drive, &self.bucket);
        config.workers = self.workers;
        config.tuning = tuning;
        Ok(config)
    }
}

/// Build one Drive client for traversal, plus a factory that gives every
/// worker its own Drive and Storage clients, and run the mirror.
pub async fn mirror_to_bucket(config: &MirrorConfig, credentials: &Credentials) -> Result<MirrorReport> {
    let timeouts = Timeouts {
        connect: config.tuning.connect_timeout(),
        read: config.tuning.read_timeout(),
    };
    let walker_drive = DriveClient::with_base_url(&credentials.drive_base, credentials.drive_token.clone(), timeouts)?;

    let credentials = credentials.clone();
    let project = config.project.clone();
    let bucket = config.bucket.clone();
    let chunk_size = config.tuning.aligned_chunk_size();
    let connect = move |worker: usize| {
        tracing::debug!(worker, "Building clients for transfer worker");
        let drive = DriveClient::with_base_url(&credentials.drive_base, credentials.drive_token.clone(), timeouts)?;
        let store = GcsBucket::with_base_url(
            &credentials.storage_base,
            credentials.storage_token.clone(),
            project.clone(),
            bucket.clone(),
            chunk_size,
            timeouts,
        )?;
        Ok::<_, MirrorError>((drive, store))
    };

    let report = mirror(config, &walker_drive, connect).await?;
    Ok(report)
}

fn print_summary(report: &MirrorReport) {
    println!(
        "Mirrored {} into gs://{}: {} copied, {} failed ({} folders, {} files found)",
        report.root,
        report.bucket,
        report.transferred.len(),
        report.failures.len(),
        report.folders_visited,
        report.enqueued
    );
    for failure in &report.failures {
        eprintln!("FAILED {} {}: {}", failure.file_id, failure.drive_path, failure.error);
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = cli.to_config()?;
    config.trace_loaded();
    let credentials = Credentials::from_env()?;

    let report = match mirror_to_bucket(&config, &credentials).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Mirror run failed");
            return Err(e);
        }
    };
    print_summary(&report);

    if let Some(path) = &cli.report {
        let json = report.to_json_pretty().context("Failed to serialise run report")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report to {path:?}"))?;
        tracing::info!(report_path = ?path, "Run report written");
    }

    if !report.is_complete() {
        bail!("{} of {} files failed to copy", report.failures.len(), report.enqueued);
    }
    println!("All done! Bye...");
    Ok(())
}
