//! opk-agent: SSH agent client for opkssh-renewer
//!
//! Registers, lists and removes certificate identities in the user's
//! running SSH agent. The endpoint is reached through a platform
//! transport (a Unix domain socket or the OpenSSH named pipe); every
//! operation opens a fresh connection.

pub mod client;
pub mod identity;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::AgentClient;
pub use identity::{AgentEntry, CertificateInfo, LoadedIdentity};
pub use transport::{default_transport, AgentStream, AgentTransport, TransportCapabilities};
