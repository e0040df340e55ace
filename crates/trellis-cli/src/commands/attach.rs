//! Attach command implementation.

use super::exit_with;
use anyhow::{Context, Result};
use clap::Args;
use trellis_cli::client::{AttachLauncher, ServerClient};
use trellis_cli::session;

/// Arguments for the attach command.
#[derive(Args)]
pub struct AttachArgs {
    /// Container handle
    pub handle: String,

    /// Process id to connect to
    #[arg(short, long)]
    pub pid: u32,

    /// Treat the process as interactive: raw terminal and resize propagation
    #[arg(short, long)]
    pub tty: bool,
}

/// Executes the attach command.
pub async fn execute(client: &ServerClient, args: AttachArgs) -> Result<()> {
    let launcher = AttachLauncher::new(client.clone(), &args.handle, args.pid);

    let outcome = if args.tty {
        session::run_interactive(launcher).await?
    } else {
        let input = session::stdin_reader().context("failed to read stdin")?;
        session::run_attached(&launcher, input, tokio::io::stdout()).await?
    };

    exit_with(outcome);
    Ok(())
}
