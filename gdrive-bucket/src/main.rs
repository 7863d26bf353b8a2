use anyhow::Result;
use clap::Parser;
use gdrive_bucket::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Tokens and endpoint overrides may come from a local .env file.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    tracing::info!(
        root = %cli.drive,
        bucket = %cli.bucket,
        workers = cli.workers,
        "gdrive-bucket starting"
    );
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Mirror aborted");
    }
    result
}
