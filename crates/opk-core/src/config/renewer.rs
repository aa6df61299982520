//! Renewer configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_human;
use crate::error::ConfigError;
use crate::store::default_ssh_dir;
use crate::types::{
    RenewalPolicy, DEFAULT_LOGIN_TIMEOUT, DEFAULT_MAX_AGE, DEFAULT_NAME, DEFAULT_POLL_INTERVAL,
    DEFAULT_VALIDITY,
};

/// Configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewerConfig {
    /// Logical identity name; also the key file name
    pub name: String,

    /// Age after which the identity is renewed
    #[serde(with = "duration_human")]
    pub max_age: Duration,

    /// Validity window of issued certificates, used for status display
    #[serde(with = "duration_human")]
    pub validity: Duration,

    /// Bound on the interactive login flow
    #[serde(with = "duration_human")]
    pub login_timeout: Duration,

    /// Interval between status checks in `watch`
    #[serde(with = "duration_human")]
    pub poll_interval: Duration,

    /// SSH directory (defaults to `~/.ssh`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_dir: Option<PathBuf>,

    /// Login command
    pub login: LoginConfig,

    /// Agent connection
    pub agent: AgentConfig,
}

impl Default for RenewerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            max_age: DEFAULT_MAX_AGE,
            validity: DEFAULT_VALIDITY,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ssh_dir: None,
            login: LoginConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl RenewerConfig {
    /// Renewal policy for this configuration
    pub fn policy(&self, force: bool) -> RenewalPolicy {
        RenewalPolicy {
            max_age: self.max_age,
            force,
        }
    }

    /// SSH directory, falling back to `~/.ssh`
    pub fn resolved_ssh_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.ssh_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_ssh_dir()
                .ok_or_else(|| ConfigError::Invalid("cannot determine home directory".into())),
        }
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "name must be a plain file name, got {:?}",
                self.name
            )));
        }
        if self.max_age.is_zero() {
            return Err(ConfigError::Invalid("max_age must be greater than zero".into()));
        }
        if self.login.program.is_empty() {
            return Err(ConfigError::Invalid("login.program must not be empty".into()));
        }
        Ok(())
    }
}

/// External login command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Program to run
    pub program: String,
    /// Arguments placed before `-i <key path>`
    pub args: Vec<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            program: "opkssh".to_string(),
            args: vec!["login".to_string()],
        }
    }
}

/// Agent connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent socket or pipe; defaults to `SSH_AUTH_SOCK` or the OpenSSH pipe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    /// Ask the agent to confirm every use of the identity
    pub confirm: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenewerConfig::default();
        assert_eq!(config.name, "id_opkssh");
        assert_eq!(config.max_age, Duration::from_secs(23 * 3600));
        assert_eq!(config.validity, Duration::from_secs(24 * 3600));
        assert_eq!(config.login_timeout, Duration::from_secs(30));
        assert_eq!(config.login.program, "opkssh");
        assert_eq!(config.login.args, vec!["login"]);
        assert!(!config.agent.confirm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: RenewerConfig = toml::from_str(
            r#"
            max_age = "12h"

            [agent]
            confirm = true
            "#,
        )
        .unwrap();

        assert_eq!(config.max_age, Duration::from_secs(12 * 3600));
        assert_eq!(config.name, "id_opkssh");
        assert!(config.agent.confirm);
        assert!(config.agent.socket.is_none());
        assert_eq!(config.login.program, "opkssh");
    }

    #[test]
    fn test_policy() {
        let config = RenewerConfig::default();
        let policy = config.policy(true);
        assert!(policy.force);
        assert_eq!(policy.max_age, config.max_age);
    }

    #[test]
    fn test_explicit_ssh_dir() {
        let config = RenewerConfig {
            ssh_dir: Some(PathBuf::from("/tmp/ssh")),
            ..Default::default()
        };
        assert_eq!(config.resolved_ssh_dir().unwrap(), PathBuf::from("/tmp/ssh"));
    }

    #[test]
    fn test_validate_rejects_path_name() {
        let config = RenewerConfig {
            name: "../id".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_max_age() {
        let config = RenewerConfig {
            max_age: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
