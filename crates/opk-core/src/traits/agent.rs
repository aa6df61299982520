//! Agent registration trait

use async_trait::async_trait;
use std::path::Path;

use crate::error::AgentError;
use crate::types::AddOptions;

/// SSH agent operations the renewer depends on
///
/// Implementations connect fresh for every call; the agent may have been
/// restarted since the previous one.
#[async_trait]
pub trait IdentityAgent: Send + Sync {
    /// Register the identity whose private key is at `key_path`.
    ///
    /// The certificate is read from `<key_path>-cert.pub`.
    async fn add_identity(&self, key_path: &Path, options: &AddOptions) -> Result<(), AgentError>;

    /// Remove the entry matching the certificate at `certificate_path`
    async fn remove_identity(&self, certificate_path: &Path) -> Result<(), AgentError>;
}
