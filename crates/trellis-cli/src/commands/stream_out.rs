//! Stream-out command implementation.

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::io::SyncIoBridge;
use trellis_cli::archive;
use trellis_cli::client::ServerClient;

/// Arguments for the stream-out command.
#[derive(Args)]
pub struct StreamOutArgs {
    /// Container handle
    pub handle: String,

    /// Source path in the container
    #[arg(short, long)]
    pub from_file: String,
}

/// Executes the stream-out command.
pub async fn execute(client: &ServerClient, args: StreamOutArgs) -> Result<()> {
    let stream = client.stream_out(&args.handle, &args.from_file).await?;
    let source = SyncIoBridge::new(stream);

    let copied = tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout().lock();
        archive::unpack_first_entry(source, &mut stdout)
    })
    .await
    .context("unpack task failed")??;

    tracing::debug!("streamed {} bytes out of {}", copied, args.from_file);
    Ok(())
}
