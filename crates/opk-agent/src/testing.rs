//! Test fixtures: freshly issued ECDSA identities and an in-memory agent

use async_trait::async_trait;
use futures::{SinkExt, TryStreamExt};
use rand::rngs::OsRng;
use ssh_agent_lib::codec::Codec;
use ssh_agent_lib::proto::{AddIdentity, Credential, KeyConstraint, Request};
use ssh_encoding::{Encode, Writer};
use ssh_key::public::KeyData;
use ssh_key::{certificate, Algorithm, Certificate, EcdsaCurve, HashAlg, LineEnding, PrivateKey};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::codec::Framed;

use opk_core::store::IdentityFiles;
use opk_core::AgentError;

use crate::transport::{AgentStream, AgentTransport, TransportCapabilities};

/// Key and certificate as the login flow would write them
pub struct IssuedIdentity {
    pub private_key: String,
    pub certificate: String,
    pub certificate_blob: Vec<u8>,
    pub public_key_blob: Vec<u8>,
    pub fingerprint: String,
}

/// Issue a one-day ECDSA user certificate signed by a throwaway CA
pub fn issue_identity(key_id: &str) -> IssuedIdentity {
    let ca = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
    let key = PrivateKey::random(
        &mut OsRng,
        Algorithm::Ecdsa {
            curve: EcdsaCurve::NistP256,
        },
    )
    .unwrap();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let mut builder = certificate::Builder::new_with_random_nonce(
        &mut OsRng,
        key.public_key().key_data().clone(),
        now - 60,
        now + 24 * 3600,
    )
    .unwrap();
    builder.serial(1).unwrap();
    builder.key_id(key_id).unwrap();
    builder.cert_type(certificate::CertType::User).unwrap();
    builder.valid_principal("alice").unwrap();
    let cert = builder.sign(&ca).unwrap();

    IssuedIdentity {
        private_key: key.to_openssh(LineEnding::LF).unwrap().to_string(),
        certificate: cert.to_openssh().unwrap(),
        certificate_blob: cert.to_bytes().unwrap(),
        public_key_blob: key.public_key().to_bytes().unwrap(),
        fingerprint: key.public_key().fingerprint(HashAlg::Sha256).to_string(),
    }
}

/// Write an issued identity as `<dir>/<name>` and `<dir>/<name>-cert.pub`
pub fn write_identity(dir: &Path, name: &str, issued: &IssuedIdentity) -> IdentityFiles {
    let files = IdentityFiles::new(dir, name);
    std::fs::write(&files.private_key, &issued.private_key).unwrap();
    std::fs::write(&files.certificate, &issued.certificate).unwrap();
    files
}

/// An add request as the in-memory agent received it
#[derive(Debug, Clone)]
pub struct ReceivedAdd {
    pub certificate: Certificate,
    pub comment: String,
    pub constraints: Vec<KeyConstraint>,
    /// Sent as the constrained variant of the request
    pub constrained: bool,
}

impl ReceivedAdd {
    /// Lifetime constraint in seconds, if one was sent
    pub fn lifetime(&self) -> Option<u32> {
        self.constraints.iter().find_map(|c| match c {
            KeyConstraint::Lifetime(seconds) => Some(*seconds),
            _ => None,
        })
    }
}

/// Entry held by the in-memory agent
#[derive(Debug, Clone)]
pub struct HeldIdentity {
    pub key_blob: Vec<u8>,
    pub public_key: Option<KeyData>,
    pub comment: String,
}

/// What the in-memory agent has seen
#[derive(Debug, Default)]
pub struct AgentState {
    pub identities: Vec<HeldIdentity>,
    pub adds: Vec<ReceivedAdd>,
    pub removes: Vec<KeyData>,
    pub connections: usize,
}

/// Reply body written verbatim after the length prefix
struct RawReply(Vec<u8>);

impl Encode for RawReply {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        Ok(self.0.len())
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        writer.write(&self.0)
    }
}

const SUCCESS: u8 = 6;
const FAILURE: u8 = 5;
const IDENTITIES_ANSWER: u8 = 12;

/// Transport to an agent living in the test process
///
/// With `reject_constraints` set the agent refuses constrained adds, the
/// way the Windows OpenSSH agent does. With `reply_code` set it answers
/// every request with that bare message type.
#[derive(Clone)]
pub struct MemoryTransport {
    pub state: Arc<Mutex<AgentState>>,
    pub capabilities: TransportCapabilities,
    pub reject_constraints: bool,
    pub reply_code: Option<u8>,
}

impl MemoryTransport {
    pub fn new(capabilities: TransportCapabilities) -> Self {
        Self {
            state: Arc::new(Mutex::new(AgentState::default())),
            capabilities,
            reject_constraints: false,
            reply_code: None,
        }
    }

    /// Load a plain public key blob into the agent
    pub fn preload(&self, key_blob: Vec<u8>, comment: &str) {
        let public_key = ssh_key::PublicKey::from_bytes(&key_blob)
            .ok()
            .map(|key| key.key_data().clone());
        self.state.lock().unwrap().identities.push(HeldIdentity {
            key_blob,
            public_key,
            comment: comment.to_string(),
        });
    }

    fn add(
        &self,
        state: &mut AgentState,
        identity: AddIdentity,
        constraints: Vec<KeyConstraint>,
        constrained: bool,
    ) -> u8 {
        if self.reject_constraints && !constraints.is_empty() {
            return FAILURE;
        }
        let (certificate, comment) = match identity.credential {
            Credential::Cert {
                certificate,
                comment,
                ..
            } => (certificate, comment),
            Credential::Key { .. } => return FAILURE,
        };

        let key_blob = certificate.to_bytes().unwrap();
        state.identities.retain(|held| held.key_blob != key_blob);
        state.identities.push(HeldIdentity {
            key_blob,
            public_key: Some(certificate.public_key().clone()),
            comment: comment.clone(),
        });
        state.adds.push(ReceivedAdd {
            certificate: *certificate,
            comment,
            constraints,
            constrained,
        });
        SUCCESS
    }

    fn handle(&self, request: Request) -> Vec<u8> {
        if let Some(code) = self.reply_code {
            return vec![code];
        }

        let mut state = self.state.lock().unwrap();
        match request {
            Request::RequestIdentities => {
                let mut body = vec![IDENTITIES_ANSWER];
                (state.identities.len() as u32).encode(&mut body).unwrap();
                for held in &state.identities {
                    held.key_blob.encode(&mut body).unwrap();
                    held.comment.encode(&mut body).unwrap();
                }
                body
            }
            Request::AddIdentity(identity) => vec![self.add(&mut state, identity, Vec::new(), false)],
            Request::AddIdConstrained(add) => {
                vec![self.add(&mut state, add.identity, add.constraints, true)]
            }
            Request::RemoveIdentity(remove) => {
                state.removes.push(remove.pubkey.clone());
                // matches on the underlying key, like OpenSSH
                let position = state
                    .identities
                    .iter()
                    .position(|held| held.public_key.as_ref() == Some(&remove.pubkey));
                match position {
                    Some(index) => {
                        state.identities.remove(index);
                        vec![SUCCESS]
                    }
                    None => vec![FAILURE],
                }
            }
            _ => vec![FAILURE],
        }
    }
}

#[async_trait]
impl AgentTransport for MemoryTransport {
    async fn connect(&self) -> Result<AgentStream, AgentError> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.state.lock().unwrap().connections += 1;

        let agent = self.clone();
        tokio::spawn(async move {
            let mut framed = Framed::new(server, Codec::<Request, RawReply>::default());
            while let Ok(Some(request)) = framed.try_next().await {
                let reply = RawReply(agent.handle(request));
                if framed.send(reply).await.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(client))
    }

    fn capabilities(&self) -> TransportCapabilities {
        self.capabilities
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}
