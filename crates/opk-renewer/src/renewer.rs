//! Renewal orchestration

use std::io;
use std::sync::Arc;
use std::time::Duration;

use opk_core::config::RenewerConfig;
use opk_core::traits::{IdentityAgent, LoginFlow};
use opk_core::types::{DEFAULT_LOGIN_TIMEOUT, DEFAULT_NAME};
use opk_core::{AddOptions, CredentialStore, IdentityAge, RenewError, RenewalPolicy};

/// Renewer settings
#[derive(Debug, Clone)]
pub struct RenewerSettings {
    /// Logical identity name
    pub name: String,
    /// When to renew
    pub policy: RenewalPolicy,
    /// Bound on the login flow
    pub login_timeout: Duration,
    /// Ask the agent to confirm each use of the identity
    pub confirm: bool,
}

impl Default for RenewerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            policy: RenewalPolicy::default(),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            confirm: false,
        }
    }
}

impl RenewerSettings {
    /// Settings from a loaded configuration
    pub fn from_config(config: &RenewerConfig, force: bool) -> Self {
        Self {
            name: config.name.clone(),
            policy: config.policy(force),
            login_timeout: config.login_timeout,
            confirm: config.agent.confirm,
        }
    }
}

/// What a renewal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Identity was fresh and was only added to the agent again
    Reregistered {
        /// Age of the identity
        age: Duration,
    },
    /// A new identity was issued and moved into place
    Renewed {
        /// Whether the previous identity was removed from the agent
        previous_removed: bool,
    },
}

/// Keeps one named identity current on disk and in the agent
///
/// At most one renewal per identity name may run at a time; the renewer
/// takes no locks of its own.
pub struct Renewer {
    settings: RenewerSettings,
    store: CredentialStore,
    agent: Arc<dyn IdentityAgent>,
    login: Arc<dyn LoginFlow>,
}

impl Renewer {
    /// Create a renewer
    pub fn new(
        settings: RenewerSettings,
        store: CredentialStore,
        agent: Arc<dyn IdentityAgent>,
        login: Arc<dyn LoginFlow>,
    ) -> Self {
        Self {
            settings,
            store,
            agent,
            login,
        }
    }

    /// Identity name
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Settings in use
    pub fn settings(&self) -> &RenewerSettings {
        &self.settings
    }

    /// Credential store in use
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Current age of the identity on disk
    pub fn identity_age(&self) -> io::Result<IdentityAge> {
        self.store.age(&self.settings.name)
    }

    /// Renew according to the configured policy
    pub async fn run(&self) -> Result<RenewalOutcome, RenewError> {
        self.renew(self.settings.policy.force).await
    }

    /// Renew, with `force` overriding the configured force flag
    pub async fn renew(&self, force: bool) -> Result<RenewalOutcome, RenewError> {
        let policy = RenewalPolicy {
            force,
            ..self.settings.policy
        };

        let age = self.identity_age().map_err(RenewError::Age)?;
        match age {
            IdentityAge::Present(age) if !policy.requires_renewal(IdentityAge::Present(age)) => {
                self.reregister(age).await
            }
            IdentityAge::Present(age) => {
                tracing::info!(
                    name = %self.settings.name,
                    age = %opk_core::time::format_hm(age),
                    force,
                    "Identity needs renewal"
                );
                self.replace().await
            }
            IdentityAge::Missing => {
                tracing::info!(name = %self.settings.name, "No identity found");
                self.replace().await
            }
        }
    }

    async fn reregister(&self, age: Duration) -> Result<RenewalOutcome, RenewError> {
        let files = self.store.files(&self.settings.name);
        // expire together with the original registration
        let remaining = self.settings.policy.max_age.saturating_sub(age);

        tracing::info!(
            name = %self.settings.name,
            age = %opk_core::time::format_hm(age),
            "Identity is fresh, adding existing identity to ssh-agent"
        );
        self.agent
            .add_identity(&files.private_key, &self.add_options(remaining))
            .await
            .map_err(RenewError::AgentAdd)?;

        Ok(RenewalOutcome::Reregistered { age })
    }

    async fn replace(&self) -> Result<RenewalOutcome, RenewError> {
        let name = self.settings.name.as_str();
        let current = self.store.files(name);

        let staging = self
            .store
            .prepare_staging(name)
            .map_err(RenewError::Staging)?;
        let staged = staging.files().clone();

        tracing::info!("Starting opkssh login flow");
        let timeout = self.settings.login_timeout;
        match tokio::time::timeout(timeout, self.login.login(&staged.private_key)).await {
            Ok(result) => result?,
            Err(_) => return Err(RenewError::LoginTimeout(timeout)),
        }

        self.store
            .promote_certificate(&staged)
            .map_err(|source| RenewError::CertificateRename {
                from: staged.public_key(),
                to: staged.certificate.clone(),
                source,
            })?;

        tracing::info!("Adding new identity to ssh-agent");
        self.agent
            .add_identity(
                &staged.private_key,
                &self.add_options(self.settings.policy.max_age),
            )
            .await
            .map_err(RenewError::AgentAdd)?;

        let previous_removed = if current.certificate.exists() {
            tracing::info!("Removing old identity from ssh-agent");
            match self.agent.remove_identity(&current.certificate).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Could not remove old identity from ssh-agent: {}", e);
                    false
                }
            }
        } else {
            tracing::debug!("No previous certificate, nothing to remove from ssh-agent");
            false
        };

        tracing::info!("Moving new identity into place");
        let committed = self.store.commit(&staged, name)?;
        tracing::debug!("Committed identity to {:?}", committed.private_key);

        drop(staging);
        Ok(RenewalOutcome::Renewed { previous_removed })
    }

    fn add_options(&self, lifetime: Duration) -> AddOptions {
        AddOptions {
            lifetime: Some(lifetime),
            confirm: self.settings.confirm,
            comment: Some(self.store.files(&self.settings.name).private_key.display().to_string()),
        }
    }
}
