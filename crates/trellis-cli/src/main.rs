//! trellis - command-line client for a remote container server.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    let filter = if cli.debug {
        "trellis=debug,trellis_cli=debug"
    } else {
        "trellis=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let client = cli.client();

    match cli.command {
        Commands::Ping => commands::ping::execute(&client).await,
        Commands::Create(args) => commands::create::execute(&client, args).await,
        Commands::Destroy(args) => commands::destroy::execute(&client, args).await,
        Commands::List => commands::list::execute(&client).await,
        Commands::Run(args) => commands::run::execute(&client, args).await,
        Commands::Attach(args) => commands::attach::execute(&client, args).await,
        Commands::Shell(args) => commands::shell::execute(&client, args).await,
        Commands::StreamIn(args) => commands::stream_in::execute(&client, args).await,
        Commands::StreamOut(args) => commands::stream_out::execute(&client, args).await,
        Commands::NetIn(args) => commands::net_in::execute(&client, args).await,
    }
}
