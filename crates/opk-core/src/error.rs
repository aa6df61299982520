//! Core error types for opkssh-renewer

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors talking to the SSH agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// No agent endpoint is configured for this platform
    #[error("SSH_AUTH_SOCK is not set and no agent socket is configured")]
    SocketNotConfigured,

    /// Could not reach the agent endpoint
    #[error("Failed to connect to agent at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed or undecodable agent traffic
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Agent answered with a failure reply
    #[error("Agent refused to {0}")]
    Refused(&'static str),

    /// Agent answered with a message that does not belong to the request
    #[error("Unexpected agent response: {0}")]
    UnexpectedResponse(String),

    /// Key or certificate could not be used
    #[error("Key error: {0}")]
    Key(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the external login flow
#[derive(Error, Debug)]
pub enum LoginError {
    /// Login program could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Login program ran but reported failure
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    /// Login program succeeded without writing the expected files
    #[error("Login did not produce {0}")]
    MissingOutput(PathBuf),
}

/// Errors moving a staged identity into place
#[derive(Error, Debug)]
pub enum CommitError {
    /// Private key rename failed; nothing was moved
    #[error("Failed to move private key {from:?} to {to:?}: {source}")]
    PrivateKey {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Private key moved but the certificate did not
    #[error(
        "Private key {key:?} was replaced but certificate {certificate:?} was not ({source}); \
         the pair no longer matches, run a forced renewal"
    )]
    Torn {
        key: PathBuf,
        certificate: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renewal errors, one per failing step
#[derive(Error, Debug)]
pub enum RenewError {
    /// Could not determine the current identity age
    #[error("Failed to read identity age: {0}")]
    Age(#[source] std::io::Error),

    /// Could not create the staging directory
    #[error("Failed to create staging directory: {0}")]
    Staging(#[source] std::io::Error),

    /// Login flow failed
    #[error("Login failed: {0}")]
    Login(#[from] LoginError),

    /// Login flow did not finish in time
    #[error("Login timed out after {}", humantime::format_duration(*.0))]
    LoginTimeout(Duration),

    /// Could not rename the login output to the certificate name
    #[error("Failed to rename {from:?} to {to:?}: {source}")]
    CertificateRename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Agent rejected or could not receive the identity
    #[error("Failed to add identity to agent: {0}")]
    AgentAdd(#[source] AgentError),

    /// Commit of the staged identity failed
    #[error("Failed to commit identity: {0}")]
    Commit(#[from] CommitError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
