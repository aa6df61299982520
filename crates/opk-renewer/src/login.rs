//! External login command

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use opk_core::config::LoginConfig;
use opk_core::store::IdentityFiles;
use opk_core::traits::LoginFlow;
use opk_core::LoginError;

/// Runs `<program> <args...> -i <key path>`, `opkssh login` by default
///
/// The child is killed if the login future is dropped, so a timeout
/// around `login` also ends the process.
#[derive(Debug, Clone)]
pub struct CommandLogin {
    program: String,
    args: Vec<String>,
}

impl CommandLogin {
    /// Login through `program` with leading `args`
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Login command from configuration
    pub fn from_config(config: &LoginConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Program that will be run
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CommandLogin {
    fn default() -> Self {
        Self::from_config(&LoginConfig::default())
    }
}

#[async_trait]
impl LoginFlow for CommandLogin {
    async fn login(&self, key_path: &Path) -> Result<(), LoginError> {
        tracing::debug!(
            program = %self.program,
            args = ?self.args,
            key = ?key_path,
            "Running login command"
        );

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg("-i")
            .arg(key_path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| LoginError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(LoginError::Failed {
                program: self.program.clone(),
                status,
            });
        }

        let files = IdentityFiles::for_key(key_path.to_path_buf());
        for path in [files.private_key.clone(), files.public_key()] {
            if !path.exists() {
                return Err(LoginError::MissingOutput(path));
            }
        }

        Ok(())
    }
}
