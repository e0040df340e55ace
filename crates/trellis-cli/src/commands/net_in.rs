//! Net-in command implementation.

use anyhow::Result;
use clap::Args;
use trellis_cli::client::{join_host_port, target_host, ServerClient};

/// Arguments for the net-in command.
#[derive(Args)]
pub struct NetInArgs {
    /// Container handle
    pub handle: String,

    /// Container port
    #[arg(short, long)]
    pub port: u32,
}

/// Executes the net-in command.
pub async fn execute(client: &ServerClient, args: NetInArgs) -> Result<()> {
    // Host port 0 lets the server pick one.
    let (host_port, _) = client.net_in(&args.handle, 0, args.port).await?;

    let host = target_host(client.target());
    println!("{}", join_host_port(host, host_port));

    Ok(())
}
