//! Watch command implementation

use anyhow::Result;
use std::time::Duration;

use crate::output::print_info;
use crate::settings::{credential_store, Overrides};
use opk_renewer::{watch, LogNotifier, StatusMonitor};

/// Check the identity periodically until interrupted
pub async fn watch_command(overrides: &Overrides, interval: Option<Duration>) -> Result<()> {
    let config = overrides.resolve()?;
    let store = credential_store(&config)?;
    let interval = interval.unwrap_or(config.poll_interval);

    if interval.is_zero() {
        anyhow::bail!("Watch interval must be greater than zero");
    }

    print_info(&format!(
        "Watching identity {} every {} (Ctrl+C to stop)",
        config.name,
        humantime::format_duration(interval)
    ));

    let mut monitor = StatusMonitor::new(config.max_age, config.validity);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    watch(
        &store,
        &config.name,
        &mut monitor,
        &LogNotifier,
        interval,
        shutdown,
    )
    .await;

    Ok(())
}
