//! Key and certificate loading
//!
//! The login flow writes an unencrypted ECDSA private key in OpenSSH
//! format and a certificate in authorized-key text format. The agent
//! needs the certificate and the private scalar.

use ssh_agent_lib::proto::{self, AddIdentity, Credential, PrivateKeyData};
use ssh_encoding::Decode;
use ssh_key::private::EcdsaKeypair;
use ssh_key::public::KeyData;
use ssh_key::{Certificate, HashAlg, PrivateKey, PublicKey};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opk_core::store::IdentityFiles;
use opk_core::AgentError;

const CERTIFICATE_TYPE_SUFFIX: &str = "-cert-v01@openssh.com";

fn key_error(context: &str, e: impl std::fmt::Display) -> AgentError {
    AgentError::Key(format!("{}: {}", context, e))
}

/// First string in an SSH wire blob, which names its key type
fn blob_key_type(blob: &[u8]) -> Option<String> {
    let mut reader = blob;
    String::decode(&mut reader).ok()
}

fn agent_private_key(keypair: &EcdsaKeypair) -> proto::EcdsaPrivateKey {
    match keypair {
        EcdsaKeypair::NistP256 { private, .. } => proto::EcdsaPrivateKey::NistP256(private.clone()),
        EcdsaKeypair::NistP384 { private, .. } => proto::EcdsaPrivateKey::NistP384(private.clone()),
        EcdsaKeypair::NistP521 { private, .. } => proto::EcdsaPrivateKey::NistP521(private.clone()),
    }
}

/// A private key and its certificate, ready to add to the agent
#[derive(Debug, Clone)]
pub struct LoadedIdentity {
    certificate: Certificate,
    private_key: proto::EcdsaPrivateKey,
    comment: String,
}

impl LoadedIdentity {
    /// Load the key at `key_path` and the certificate at `<key_path>-cert.pub`
    pub async fn load(key_path: &Path) -> Result<Self, AgentError> {
        let files = IdentityFiles::for_key(key_path.to_path_buf());

        let private_key = tokio::fs::read_to_string(&files.private_key)
            .await
            .map_err(|e| key_error(&format!("reading {:?}", files.private_key), e))?;
        let certificate = tokio::fs::read_to_string(&files.certificate)
            .await
            .map_err(|e| key_error(&format!("reading {:?}", files.certificate), e))?;

        let mut identity = Self::from_openssh(&private_key, &certificate)?;
        if identity.comment.is_empty() {
            identity.comment = files.private_key.display().to_string();
        }
        Ok(identity)
    }

    /// Build from OpenSSH private key text and certificate text
    pub fn from_openssh(private_key: &str, certificate: &str) -> Result<Self, AgentError> {
        let private_key =
            PrivateKey::from_openssh(private_key).map_err(|e| key_error("parsing private key", e))?;
        if private_key.is_encrypted() {
            return Err(AgentError::Key("private key is passphrase protected".into()));
        }

        let ecdsa = private_key.key_data().ecdsa().ok_or_else(|| {
            AgentError::Key(format!(
                "expected an ECDSA private key, found {}",
                private_key.algorithm()
            ))
        })?;

        let certificate =
            Certificate::from_openssh(certificate).map_err(|e| key_error("parsing certificate", e))?;
        if certificate.public_key() != private_key.public_key().key_data() {
            return Err(AgentError::Key(
                "certificate does not belong to the private key".into(),
            ));
        }

        Ok(Self {
            certificate,
            private_key: agent_private_key(ecdsa),
            comment: private_key.comment().to_string(),
        })
    }

    /// Certificate key type
    pub fn key_type(&self) -> String {
        self.certificate.algorithm().to_certificate_type()
    }

    /// The certificate sent with the identity
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Comment sent with the identity
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Replace the comment sent with the identity
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Agent request adding this identity
    pub fn to_add_request(&self) -> AddIdentity {
        AddIdentity {
            credential: Credential::Cert {
                algorithm: self.certificate.algorithm(),
                certificate: Box::new(self.certificate.clone()),
                privkey: PrivateKeyData::Ecdsa(self.private_key.clone()),
                comment: self.comment.clone(),
            },
        }
    }
}

/// Read the certificate at `path`
pub async fn read_certificate(path: &Path) -> Result<Certificate, AgentError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| key_error(&format!("reading {:?}", path), e))?;
    Certificate::from_openssh(&text).map_err(|e| key_error("parsing certificate", e))
}

/// Details of an SSH certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Key ID, usually the OIDC identity
    pub key_id: String,
    /// Principals the certificate is valid for
    pub principals: Vec<String>,
    /// Serial number
    pub serial: u64,
    /// Start of validity, seconds since the epoch
    pub valid_after: u64,
    /// End of validity, seconds since the epoch
    pub valid_before: u64,
    /// SHA-256 fingerprint of the certified key
    pub fingerprint: String,
}

impl CertificateInfo {
    /// Extract details from a parsed certificate
    pub fn from_certificate(certificate: &Certificate) -> Self {
        Self {
            key_id: certificate.key_id().to_string(),
            principals: certificate.valid_principals().to_vec(),
            serial: certificate.serial(),
            valid_after: certificate.valid_after(),
            valid_before: certificate.valid_before(),
            fingerprint: certificate
                .public_key()
                .fingerprint(HashAlg::Sha256)
                .to_string(),
        }
    }

    /// Read a certificate file in authorized-key text format
    pub async fn read(path: &Path) -> Result<Self, AgentError> {
        let certificate = read_certificate(path).await?;
        Ok(Self::from_certificate(&certificate))
    }

    /// Time until the certificate expires, or None if it already has
    pub fn expires_in(&self) -> Option<Duration> {
        let valid_before = UNIX_EPOCH.checked_add(Duration::from_secs(self.valid_before))?;
        valid_before.duration_since(SystemTime::now()).ok()
    }
}

/// An identity currently loaded in the agent
///
/// The key blob is kept as the agent sent it. Certificate entries carry
/// the whole certificate, which the plain public key parser cannot read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEntry {
    /// Public key or certificate blob
    pub key_blob: Vec<u8>,
    /// Comment supplied when the identity was added
    pub comment: String,
}

impl AgentEntry {
    /// Key type named in the blob
    pub fn key_type(&self) -> Option<String> {
        blob_key_type(&self.key_blob)
    }

    /// Whether the entry is a certificate
    pub fn is_certificate(&self) -> bool {
        self.key_type()
            .map(|t| t.ends_with(CERTIFICATE_TYPE_SUFFIX))
            .unwrap_or(false)
    }

    /// Parsed certificate, if the entry is one
    pub fn certificate(&self) -> Option<Certificate> {
        if !self.is_certificate() {
            return None;
        }
        Certificate::from_bytes(&self.key_blob).ok()
    }

    /// SHA-256 fingerprint of the underlying public key
    pub fn fingerprint(&self) -> Option<String> {
        let key_data: KeyData = match self.certificate() {
            Some(certificate) => certificate.public_key().clone(),
            None => PublicKey::from_bytes(&self.key_blob).ok()?.key_data().clone(),
        };
        Some(key_data.fingerprint(HashAlg::Sha256).to_string())
    }
}
