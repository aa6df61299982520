//! opkssh-renewer CLI
//!
//! Command implementations and terminal output for the `opkssh-renewer`
//! binary. Configuration is resolved from flags, then the config file,
//! then built-in defaults.

pub mod commands;
pub mod output;
pub mod settings;
