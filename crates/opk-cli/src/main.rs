//! opkssh-renewer CLI
//!
//! Keeps an opkssh identity fresh on disk and loaded in the SSH agent:
//! - Renewal (login, swap into place, register with the agent)
//! - Status of the identity on disk
//! - Identities loaded in the agent
//! - A watch loop that warns before the identity expires

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opkssh_renewer::commands;
use opkssh_renewer::output::{error_chain, print_error};
use opkssh_renewer::settings::Overrides;

#[derive(Parser)]
#[command(name = "opkssh-renewer")]
#[command(author, version, about = "Keeps an opkssh SSH identity renewed and loaded in ssh-agent")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "OPKSSH_RENEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Identity name, also the key file name in the SSH directory [default: id_opkssh]
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Renew once the identity is older than this [default: 23h]
    #[arg(long = "maxage", global = true, value_parser = humantime::parse_duration)]
    max_age: Option<Duration>,

    /// Renew even if the identity is still fresh; with `config init`, overwrite
    #[arg(short, long, global = true)]
    force: bool,

    /// SSH directory holding the identity [default: ~/.ssh]
    #[arg(long, global = true, env = "OPKSSH_RENEWER_SSH_DIR")]
    ssh_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Renew the identity if needed and add it to ssh-agent (default)
    Renew,

    /// Show the age and status of the identity
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List identities loaded in ssh-agent
    List,

    /// Check the identity periodically and warn before it expires
    Watch {
        /// Time between checks (overrides config)
        #[arg(short, long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Initialize default configuration (--force overwrites)
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&error_chain(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        config_path: cli.config.clone(),
        name: cli.name.clone(),
        max_age: cli.max_age,
        ssh_dir: cli.ssh_dir.clone(),
    };
    let config_path = cli.config.as_ref();

    match cli.command.unwrap_or(Commands::Renew) {
        Commands::Renew => commands::renew_command(&overrides, cli.force).await,
        Commands::Status { json } => commands::status_command(&overrides, json).await,
        Commands::List => commands::list_command(&overrides).await,
        Commands::Watch { interval } => commands::watch_command(&overrides, interval).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Path => commands::config_path(config_path),
            ConfigAction::Get { key } => commands::config_get(config_path, &key),
            ConfigAction::Set { key, value } => commands::config_set(config_path, &key, &value),
            ConfigAction::Init => commands::config_init(config_path, cli.force),
        },
    }
}
