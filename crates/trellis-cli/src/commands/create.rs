//! Create command implementation.

use anyhow::Result;
use clap::Args;
use trellis_cli::client::{ContainerSpec, ServerClient};

/// Arguments for the create command.
#[derive(Args)]
pub struct CreateArgs {
    /// Name to give the container
    #[arg(short = 'n', long)]
    pub handle: Option<String>,

    /// Rootfs image with which to create the container
    #[arg(short, long)]
    pub rootfs: Option<String>,

    /// Grace time in seconds (resetting ttl) of the container
    #[arg(short, long)]
    pub grace: Option<u64>,

    /// Privileged user in the container is privileged on the host
    #[arg(short, long)]
    pub privileged: bool,
}

/// Executes the create command.
pub async fn execute(client: &ServerClient, args: CreateArgs) -> Result<()> {
    let spec = ContainerSpec {
        handle: args.handle,
        rootfs: args.rootfs,
        grace_time: args.grace,
        privileged: args.privileged,
    };

    let handle = client.create(&spec).await?;
    println!("{handle}");

    Ok(())
}
