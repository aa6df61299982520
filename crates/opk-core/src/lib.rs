//! opk-core: Core abstractions and configuration for opkssh-renewer
//!
//! This crate provides the shared types, the on-disk credential store,
//! the collaborator traits and the configuration structures used by the
//! agent client, the renewer and the CLI.

pub mod config;
pub mod error;
pub mod store;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{AgentError, CommitError, ConfigError, LoginError, RenewError};
pub use store::{CredentialStore, IdentityFiles, StagingArea};
pub use types::{AddOptions, IdentityAge, IdentityStatus, RenewalPolicy};
