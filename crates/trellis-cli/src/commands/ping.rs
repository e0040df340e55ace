//! Ping command implementation.

use anyhow::Result;
use trellis_cli::client::ServerClient;

/// Executes the ping command.
pub async fn execute(client: &ServerClient) -> Result<()> {
    client.ping().await
}
