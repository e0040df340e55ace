//! CLI command implementations.
//!
//! This module contains all the command handlers for the trellis CLI.
//! Commands are organized into:
//!
//! - Container operations (create, destroy, list)
//! - Process operations (run, attach, shell)
//! - File operations (stream-in, stream-out)
//! - Network operations (net-in)

use clap::{Parser, Subcommand};
use trellis_cli::client::{ServerClient, DEFAULT_TARGET};
use trellis_cli::process::ExitOutcome;

pub mod attach;
pub mod create;
pub mod destroy;
pub mod list;
pub mod net_in;
pub mod ping;
pub mod run;
pub mod shell;
pub mod stream_in;
pub mod stream_out;

/// trellis - a command-line client for container servers
#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Server to which commands are sent
    #[arg(short = 'T', long, global = true, env = "TRELLIS_TARGET", default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Cli {
    /// Builds a server client for the configured target.
    pub fn client(&self) -> ServerClient {
        ServerClient::new(self.target.clone())
    }
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check if the server is running
    Ping,

    /// Create a container
    Create(create::CreateArgs),

    /// Destroy one or more containers
    Destroy(destroy::DestroyArgs),

    /// List containers
    List,

    /// Run a command in a container
    Run(run::RunArgs),

    /// Attach to a process running in a container
    Attach(attach::AttachArgs),

    /// Open a shell inside a running container
    Shell(shell::ShellArgs),

    /// Stream a file from stdin into a container
    StreamIn(stream_in::StreamInArgs),

    /// Stream a file out of a container to stdout
    StreamOut(stream_out::StreamOutArgs),

    /// Map a port on the host to a port in the container
    NetIn(net_in::NetInArgs),
}

/// Exits with the process's status if it did not succeed.
pub(crate) fn exit_with(outcome: ExitOutcome) {
    if !outcome.success() {
        std::process::exit(outcome.exit_status);
    }
}
