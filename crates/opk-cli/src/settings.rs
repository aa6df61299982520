//! Effective configuration for a CLI invocation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use opk_core::config::{self, RenewerConfig};
use opk_core::CredentialStore;

/// Values given on the command line, which take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Config file location
    pub config_path: Option<PathBuf>,
    /// Identity name
    pub name: Option<String>,
    /// Renewal age
    pub max_age: Option<Duration>,
    /// SSH directory
    pub ssh_dir: Option<PathBuf>,
}

impl Overrides {
    /// Config file path, explicit or default
    pub fn config_file(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(config::default_config_path)
    }

    /// Load the config file (or defaults) and apply the overrides
    pub fn resolve(&self) -> Result<RenewerConfig> {
        let path = self.config_file();
        let mut resolved = load(&path, self.config_path.is_some())?;

        if let Some(name) = &self.name {
            resolved.name = name.clone();
        }
        if let Some(max_age) = self.max_age {
            resolved.max_age = max_age;
        }
        if let Some(ssh_dir) = &self.ssh_dir {
            resolved.ssh_dir = Some(ssh_dir.clone());
        }

        resolved
            .validate()
            .with_context(|| format!("Invalid configuration from {:?}", path))?;
        Ok(resolved)
    }
}

fn load(path: &Path, explicit: bool) -> Result<RenewerConfig> {
    // an explicitly named file has to exist
    if explicit {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }
    config::load_or_default(path).with_context(|| format!("Failed to load config from {:?}", path))
}

/// Credential store for the resolved configuration
pub fn credential_store(config: &RenewerConfig) -> Result<CredentialStore> {
    let ssh_dir = config
        .resolved_ssh_dir()
        .context("Failed to determine SSH directory")?;
    Ok(CredentialStore::new(ssh_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "name = \"id_file\"\nmax_age = \"12h\"\n").unwrap();

        let overrides = Overrides {
            config_path: Some(path),
            name: Some("id_flag".to_string()),
            ..Default::default()
        };
        let resolved = overrides.resolve().unwrap();
        assert_eq!(resolved.name, "id_flag");
        assert_eq!(resolved.max_age, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let overrides = Overrides {
            config_path: Some(temp.path().join("absent.toml")),
            ..Default::default()
        };
        assert!(overrides.resolve().is_err());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let overrides = Overrides {
            config_path: Some(path),
            max_age: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(overrides.resolve().is_err());
    }

    #[test]
    fn test_store_uses_ssh_dir() {
        let config = RenewerConfig {
            ssh_dir: Some(PathBuf::from("/tmp/opk-ssh")),
            ..Default::default()
        };
        let store = credential_store(&config).unwrap();
        assert_eq!(store.ssh_dir(), Path::new("/tmp/opk-ssh"));
    }
}
