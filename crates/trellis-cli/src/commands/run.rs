//! Run command implementation.

use super::exit_with;
use anyhow::{Context, Result};
use clap::Args;
use trellis_cli::client::{RunLauncher, ServerClient};
use trellis_cli::process::ProcessSpec;
use trellis_cli::session;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Container handle
    pub handle: String,

    /// Command to execute
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,

    /// Attach to the process after it is started
    #[arg(short, long)]
    pub attach: bool,

    /// Allocate a pseudo-TTY and run interactively (implies --attach)
    #[arg(short, long)]
    pub tty: bool,

    /// Working directory of the process
    #[arg(short, long)]
    pub dir: Option<String>,

    /// User to run the process as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Use the privileged user in the container
    #[arg(short, long)]
    pub privileged: bool,

    /// Environment variables (KEY=VALUE)
    #[arg(short, long)]
    pub env: Vec<String>,
}

impl RunArgs {
    fn process_spec(&self) -> Result<ProcessSpec> {
        let mut spec = ProcessSpec::from_command(&self.command).context("missing command")?;
        spec.dir = self.dir.clone();
        spec.user = self.user.clone();
        spec.privileged = self.privileged;
        spec.env = self.env.clone();
        Ok(spec)
    }
}

/// Executes the run command.
pub async fn execute(client: &ServerClient, args: RunArgs) -> Result<()> {
    let spec = args.process_spec()?;

    if args.tty {
        // Interactive mode: raw terminal, pseudo-TTY and resize propagation
        let launcher = RunLauncher::new(client.clone(), &args.handle, spec);
        let outcome = session::run_interactive(launcher).await?;
        exit_with(outcome);
    } else if args.attach {
        let launcher = RunLauncher::new(client.clone(), &args.handle, spec);
        let input = session::stdin_reader().context("failed to read stdin")?;
        let outcome = session::run_attached(&launcher, input, tokio::io::stdout()).await?;
        exit_with(outcome);
    } else {
        // Detached mode: print the process id and exit
        let id = client.run_process(&args.handle, &spec).await?;
        println!("{id}");
    }

    Ok(())
}
