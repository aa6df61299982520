//! CLI command implementations

mod config;
mod list;
mod renew;
mod status;
mod watch;

pub use config::{config_get, config_init, config_path, config_set, config_show};
pub use list::list_command;
pub use renew::renew_command;
pub use status::status_command;
pub use watch::watch_command;
