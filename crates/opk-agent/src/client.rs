//! Agent client

use async_trait::async_trait;
use futures::{SinkExt, TryStreamExt};
use ssh_agent_lib::agent::Session;
use ssh_agent_lib::client::Client;
use ssh_agent_lib::codec::Codec;
use ssh_agent_lib::error::AgentError as SessionError;
use ssh_agent_lib::proto::{
    AddIdentityConstrained, KeyConstraint, ProtoError, RemoveIdentity, Request,
};
use ssh_encoding::{Decode, Reader};
use ssh_key::public::KeyData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::codec::Framed;

use opk_core::traits::IdentityAgent;
use opk_core::{AddOptions, AgentError};

use crate::identity::{read_certificate, AgentEntry, LoadedIdentity};
use crate::transport::{default_transport, AgentStream, AgentTransport, TransportCapabilities};

const SSH_AGENT_FAILURE: u8 = 5;
const SSH_AGENT_IDENTITIES_ANSWER: u8 = 12;
const SSH2_AGENT_FAILURE: u8 = 30;
const SSH_COM_AGENT2_FAILURE: u8 = 102;

const ADD: &str = "add identity";
const REMOVE: &str = "remove identity";
const LIST: &str = "list identities";

/// Whole seconds for a lifetime constraint, or None for no limit.
///
/// Rounds to the nearest second, but never below one: a remaining
/// lifetime shorter than half a second must still expire.
fn lifetime_secs(lifetime: Duration) -> Option<u32> {
    if lifetime.is_zero() {
        return None;
    }
    let rounded = lifetime.as_secs() + u64::from(lifetime.subsec_millis() >= 500);
    Some(u32::try_from(rounded.max(1)).unwrap_or(u32::MAX))
}

/// Translate a session error for `operation`.
///
/// Any reply other than success to an add or remove is a refusal, as are
/// the two legacy failure codes OpenSSH also accepts.
fn session_error(operation: &'static str, error: SessionError) -> AgentError {
    match error {
        SessionError::Failure | SessionError::Proto(ProtoError::UnexpectedResponse) => {
            AgentError::Refused(operation)
        }
        SessionError::Proto(ProtoError::UnsupportedCommand {
            command: SSH2_AGENT_FAILURE | SSH_COM_AGENT2_FAILURE,
        }) => AgentError::Refused(operation),
        SessionError::Proto(ProtoError::UnsupportedCommand { command }) => {
            AgentError::UnexpectedResponse(format!("message type {} to {}", command, operation))
        }
        SessionError::IO(e) | SessionError::Proto(ProtoError::IO(e)) => AgentError::Io(e),
        other => AgentError::Protocol(other.to_string()),
    }
}

/// Reply to an identities request.
///
/// Entries keep the key blob as the agent sent it; certificate blobs do
/// not survive the plain public key parser used for `Identity`.
enum IdentitiesReply {
    Entries(Vec<AgentEntry>),
    Failure,
}

impl Decode for IdentitiesReply {
    type Error = ProtoError;

    fn decode(reader: &mut impl Reader) -> Result<Self, ProtoError> {
        match u8::decode(reader)? {
            SSH_AGENT_IDENTITIES_ANSWER => {
                let count = u32::decode(reader)?;
                let mut entries = Vec::new();
                for _ in 0..count {
                    let key_blob = Vec::<u8>::decode(reader)?;
                    let comment = String::decode(reader)?;
                    entries.push(AgentEntry { key_blob, comment });
                }
                Ok(Self::Entries(entries))
            }
            SSH_AGENT_FAILURE | SSH2_AGENT_FAILURE | SSH_COM_AGENT2_FAILURE => Ok(Self::Failure),
            command => Err(ProtoError::UnsupportedCommand { command }),
        }
    }
}

/// Handle to the user's SSH agent
///
/// Holds no connection; each operation connects, sends one request and
/// reads one reply.
#[derive(Clone)]
pub struct AgentClient {
    transport: Arc<dyn AgentTransport>,
}

impl AgentClient {
    /// Create a client over `transport`
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }

    /// Client for the platform's default agent, or `socket` if given
    pub fn from_socket(socket: Option<&Path>) -> Result<Self, AgentError> {
        Ok(Self::new(default_transport(socket)?))
    }

    /// Endpoint this client talks to
    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Constraints the agent accepts
    pub fn capabilities(&self) -> TransportCapabilities {
        self.transport.capabilities()
    }

    /// Constraints for `options`, leaving out any the agent cannot honour
    pub fn constraints(&self, options: &AddOptions) -> Vec<KeyConstraint> {
        let capabilities = self.capabilities();
        let mut constraints = Vec::new();

        if let Some(seconds) = options.lifetime.and_then(lifetime_secs) {
            if capabilities.key_lifetime {
                constraints.push(KeyConstraint::Lifetime(seconds));
            } else {
                tracing::debug!(
                    endpoint = %self.endpoint(),
                    "Agent does not support key lifetimes, adding without one"
                );
            }
        }

        if options.confirm {
            if capabilities.confirm {
                constraints.push(KeyConstraint::Confirm);
            } else {
                tracing::debug!(
                    endpoint = %self.endpoint(),
                    "Agent does not support confirmation, adding without it"
                );
            }
        }

        constraints
    }

    async fn session(&self) -> Result<Client<AgentStream>, AgentError> {
        Ok(Client::new(self.transport.connect().await?))
    }

    /// Add a certificate identity
    pub async fn add(
        &self,
        identity: &LoadedIdentity,
        options: &AddOptions,
    ) -> Result<(), AgentError> {
        let constraints = self.constraints(options);
        tracing::debug!(
            key_type = %identity.key_type(),
            comment = identity.comment(),
            constraints = constraints.len(),
            "Adding identity to agent"
        );

        let request = identity.to_add_request();
        let mut session = self.session().await?;
        let result = if constraints.is_empty() {
            session.add_identity(request).await
        } else {
            session
                .add_identity_constrained(AddIdentityConstrained {
                    identity: request,
                    constraints,
                })
                .await
        };
        result.map_err(|e| session_error(ADD, e))
    }

    /// Remove the entry for `pubkey`.
    ///
    /// The agent matches on the underlying public key, so this also drops
    /// a certificate entry issued for it.
    pub async fn remove(&self, pubkey: KeyData) -> Result<(), AgentError> {
        let mut session = self.session().await?;
        session
            .remove_identity(RemoveIdentity { pubkey })
            .await
            .map_err(|e| session_error(REMOVE, e))
    }

    /// Remove the entry for the certificate stored at `path`
    pub async fn remove_certificate_file(&self, path: &Path) -> Result<(), AgentError> {
        let certificate = read_certificate(path).await?;
        self.remove(certificate.public_key().clone()).await
    }

    /// Identities currently loaded in the agent
    pub async fn list(&self) -> Result<Vec<AgentEntry>, AgentError> {
        let stream = self.transport.connect().await?;
        let mut framed = Framed::new(stream, Codec::<IdentitiesReply, Request>::default());

        framed
            .send(Request::RequestIdentities)
            .await
            .map_err(|e| session_error(LIST, e))?;
        match framed.try_next().await.map_err(|e| session_error(LIST, e))? {
            Some(IdentitiesReply::Entries(entries)) => Ok(entries),
            Some(IdentitiesReply::Failure) => Err(AgentError::Refused(LIST)),
            None => Err(AgentError::Protocol(
                "agent closed the connection before replying".into(),
            )),
        }
    }
}

#[async_trait]
impl IdentityAgent for AgentClient {
    async fn add_identity(&self, key_path: &Path, options: &AddOptions) -> Result<(), AgentError> {
        let mut identity = LoadedIdentity::load(key_path).await?;
        if let Some(comment) = &options.comment {
            identity.set_comment(comment.clone());
        }
        self.add(&identity, options).await
    }

    async fn remove_identity(&self, certificate_path: &Path) -> Result<(), AgentError> {
        self.remove_certificate_file(certificate_path).await
    }
}
