//! Destroy command implementation.

use anyhow::{Context, Result};
use clap::Args;
use trellis_cli::client::ServerClient;

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    /// Container handles
    #[arg(required = true)]
    pub handles: Vec<String>,
}

/// Executes the destroy command.
pub async fn execute(client: &ServerClient, args: DestroyArgs) -> Result<()> {
    for handle in &args.handles {
        client
            .destroy(handle)
            .await
            .with_context(|| format!("failed to destroy {handle}"))?;
        tracing::debug!("destroyed {}", handle);
    }

    Ok(())
}
