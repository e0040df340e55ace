//! Stream-in command implementation.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use tokio_util::io::SyncIoBridge;
use trellis_cli::archive;
use trellis_cli::client::ServerClient;

/// Buffer between the archive writer and the upload.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Arguments for the stream-in command.
#[derive(Args)]
pub struct StreamInArgs {
    /// Container handle
    pub handle: String,

    /// Destination path in the container
    #[arg(short, long)]
    pub to_file: String,
}

/// Executes the stream-in command.
pub async fn execute(client: &ServerClient, args: StreamInArgs) -> Result<()> {
    let (directory, name) = split_destination(&args.to_file)?;

    // The archive header needs the exact length, so stdin is staged first.
    let staged = tokio::task::spawn_blocking(move || archive::stage(std::io::stdin().lock(), &name))
        .await
        .context("staging task failed")??;
    tracing::debug!("staged {} bytes for {}", staged.len(), args.to_file);

    let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
    let writer = SyncIoBridge::new(writer);
    let packer = tokio::task::spawn_blocking(move || staged.write_archive(writer).map(drop));

    client.stream_in(&args.handle, &directory, reader).await?;
    packer.await.context("archive task failed")??;

    Ok(())
}

/// Splits a destination into its parent directory and base name.
fn split_destination(destination: &str) -> Result<(String, String)> {
    let path = Path::new(destination);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("destination {destination:?} does not name a file"))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    };
    Ok((directory, name.to_string()))
}
