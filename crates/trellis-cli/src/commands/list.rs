//! List command implementation.

use anyhow::Result;
use trellis_cli::client::ServerClient;

/// Executes the list command.
pub async fn execute(client: &ServerClient) -> Result<()> {
    for handle in client.containers().await? {
        println!("{handle}");
    }

    Ok(())
}
