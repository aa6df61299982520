//! List command implementation

use anyhow::{Context, Result};

use crate::output::format_entries;
use crate::settings::Overrides;
use opk_agent::AgentClient;

/// List identities loaded in the agent
pub async fn list_command(overrides: &Overrides) -> Result<()> {
    let config = overrides.resolve()?;
    let agent = AgentClient::from_socket(config.agent.socket.as_deref())?;

    let entries = agent
        .list()
        .await
        .with_context(|| format!("Failed to list identities from {}", agent.endpoint()))?;

    println!("{}", format_entries(&entries));
    Ok(())
}
