//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use opk_core::config::{self, RenewerConfig};

fn config_file(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(config::default_config_path)
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Print the config file location
pub fn config_path(config_path: Option<&PathBuf>) -> Result<()> {
    println!("{}", config_file(config_path).display());
    Ok(())
}

/// Get a config value by key
pub fn config_get(config_path: Option<&PathBuf>, key: &str) -> Result<()> {
    let path = config_file(config_path);

    // Fall back to the defaults so unset keys still answer
    let root = if path.exists() {
        toml::Value::Table(read_table(&path)?)
    } else {
        toml::Value::try_from(RenewerConfig::default())
            .context("Failed to serialize default configuration")?
    };

    let mut current = &root;
    for part in key.split('.') {
        match current.as_table().and_then(|t| t.get(part)) {
            Some(value) => current = value,
            None => anyhow::bail!("Key not found: {}", key),
        }
    }

    match current {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Array(a) => {
            for item in a {
                match item.as_str() {
                    Some(s) => println!("{}", s),
                    None => println!("{}", item),
                }
            }
        }
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(current)?),
        other => println!("{}", other),
    }

    Ok(())
}

/// Set a config value by key
///
/// The edited file must still parse as a valid configuration before it is
/// written back.
pub fn config_set(config_path: Option<&PathBuf>, key: &str, value: &str) -> Result<()> {
    let path = config_file(config_path);

    if !path.exists() {
        print_info("Creating default configuration...");
        config_init(config_path, false)?;
    }

    let mut table = read_table(&path)?;

    let parts: Vec<&str> = key.split('.').collect();
    let (last_key, parents) = parts
        .split_last()
        .filter(|(last, _)| !last.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid key: key path cannot be empty"))?;

    let mut current = &mut table;
    for part in parents {
        current = current
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }

    let toml_value = if value == "true" {
        toml::Value::Boolean(true)
    } else if value == "false" {
        toml::Value::Boolean(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(value.to_string())
    };
    current.insert(last_key.to_string(), toml_value);

    let updated: RenewerConfig = toml::Value::Table(table.clone())
        .try_into()
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;
    updated
        .validate()
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;

    let new_content = toml::to_string_pretty(&table)?;
    std::fs::write(&path, new_content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = config_file(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'opkssh-renewer config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Write the default configuration
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = config_file(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            print_success(&format!("Created config directory: {:?}", dir));
        }
    }

    std::fs::write(&path, generate_default_config())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

fn generate_default_config() -> String {
    r#"# opkssh-renewer configuration

# Identity file name inside the SSH directory
name = "id_opkssh"

# Renew once the identity is this old
max_age = "23h"

# How long issued certificates stay valid
validity = "24h"

# Give up on the login flow after this long
login_timeout = "30s"

# How often `watch` checks the identity
poll_interval = "1m"

# SSH directory, defaults to ~/.ssh
# ssh_dir = "/home/user/.ssh"

[login]
program = "opkssh"
args = ["login"]

[agent]
# Agent socket, defaults to $SSH_AUTH_SOCK
# socket = "/run/user/1000/ssh-agent.socket"

# Ask the agent to confirm every use of the identity
confirm = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let parsed: RenewerConfig = toml::from_str(&generate_default_config()).unwrap();
        let defaults = RenewerConfig::default();
        assert_eq!(parsed.name, defaults.name);
        assert_eq!(parsed.max_age, defaults.max_age);
        assert_eq!(parsed.validity, defaults.validity);
        assert_eq!(parsed.login_timeout, defaults.login_timeout);
        assert_eq!(parsed.poll_interval, defaults.poll_interval);
        assert_eq!(parsed.login.program, "opkssh");
        assert!(!parsed.agent.confirm);
    }

    #[test]
    fn test_set_writes_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        config_set(Some(&path), "max_age", "12h").unwrap();
        config_set(Some(&path), "agent.confirm", "true").unwrap();

        let loaded: RenewerConfig = config::load_config(&path).unwrap();
        assert_eq!(loaded.max_age, Duration::from_secs(12 * 3600));
        assert!(loaded.agent.confirm);
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        config_init(Some(&path), false).unwrap();

        assert!(config_set(Some(&path), "max_age", "soon").is_err());
        assert!(config_set(Some(&path), "name", "../escape").is_err());

        let loaded: RenewerConfig = config::load_config(&path).unwrap();
        assert_eq!(loaded.max_age, Duration::from_secs(23 * 3600));
        assert_eq!(loaded.name, "id_opkssh");
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "name = \"id_mine\"\n").unwrap();

        config_init(Some(&path), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "name = \"id_mine\"\n");

        config_init(Some(&path), true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("id_opkssh"));
    }

    #[test]
    fn test_get_unknown_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        assert!(config_get(Some(&path), "agent.nope").is_err());
        assert!(config_get(Some(&path), "login.program").is_ok());
    }
}
