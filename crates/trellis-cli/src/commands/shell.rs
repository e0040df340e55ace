//! Shell command implementation.

use super::exit_with;
use anyhow::Result;
use clap::Args;
use trellis_cli::client::{RunLauncher, ServerClient};
use trellis_cli::process::ProcessSpec;
use trellis_cli::session;

/// Shell started inside the container.
const SHELL_PATH: &str = "/bin/sh";

/// Arguments for the shell command.
#[derive(Args)]
pub struct ShellArgs {
    /// Container handle
    pub handle: String,
}

/// Executes the shell command.
pub async fn execute(client: &ServerClient, args: ShellArgs) -> Result<()> {
    let term = std::env::var("TERM").unwrap_or_default();
    let spec = ProcessSpec {
        path: SHELL_PATH.to_string(),
        args: vec!["-l".to_string()],
        env: vec![format!("TERM={term}")],
        privileged: true,
        ..Default::default()
    };

    let launcher = RunLauncher::new(client.clone(), &args.handle, spec);
    let outcome = session::run_interactive(launcher).await?;
    exit_with(outcome);

    Ok(())
}
