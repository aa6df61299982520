//! Renew command implementation

use anyhow::Result;
use std::sync::Arc;

use crate::output::{print_info, print_success};
use crate::settings::{credential_store, Overrides};
use opk_agent::AgentClient;
use opk_core::time::format_hm;
use opk_renewer::{CommandLogin, RenewalOutcome, Renewer, RenewerSettings};

/// Renew the identity if it is due, otherwise re-add it to the agent
pub async fn renew_command(overrides: &Overrides, force: bool) -> Result<()> {
    let config = overrides.resolve()?;
    let store = credential_store(&config)?;

    let agent = AgentClient::from_socket(config.agent.socket.as_deref())?;
    tracing::debug!(endpoint = %agent.endpoint(), "Using ssh-agent");

    let login = CommandLogin::from_config(&config.login);
    let renewer = Renewer::new(
        RenewerSettings::from_config(&config, force),
        store,
        Arc::new(agent),
        Arc::new(login),
    );

    match renewer.run().await? {
        RenewalOutcome::Reregistered { age } => {
            print_success(&format!(
                "Identity {} is {} old, added to ssh-agent",
                renewer.name(),
                format_hm(age)
            ));
        }
        RenewalOutcome::Renewed { previous_removed } => {
            print_success(&format!("Renewed identity {}", renewer.name()));
            if previous_removed {
                print_info("Removed the previous identity from ssh-agent");
            }
        }
    }

    Ok(())
}
