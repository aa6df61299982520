//! Platform transports to the SSH agent
//!
//! Each transport reports what the agent behind it can honour. The
//! Windows OpenSSH agent rejects lifetime and confirm constraints, so the
//! named pipe transport advertises neither and the client leaves them out.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use opk_core::AgentError;

/// Byte stream to a connected agent
pub trait AgentIo: fmt::Debug + AsyncRead + AsyncWrite + Send + Sync + Unpin {}

impl<T: fmt::Debug + AsyncRead + AsyncWrite + Send + Sync + Unpin> AgentIo for T {}

/// Boxed connection returned by a transport
pub type AgentStream = Box<dyn AgentIo>;

/// Constraints the agent behind a transport accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// Agent honours a lifetime constraint
    pub key_lifetime: bool,
    /// Agent honours a confirm constraint
    pub confirm: bool,
}

impl TransportCapabilities {
    /// Agent supports every constraint
    pub const FULL: Self = Self {
        key_lifetime: true,
        confirm: true,
    };

    /// Agent supports no constraints
    pub const NONE: Self = Self {
        key_lifetime: false,
        confirm: false,
    };
}

/// A way to reach the SSH agent
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Open a new connection
    async fn connect(&self) -> Result<AgentStream, AgentError>;

    /// Constraints the agent accepts
    fn capabilities(&self) -> TransportCapabilities;

    /// Human-readable endpoint, for logs
    fn endpoint(&self) -> String;
}

#[cfg(unix)]
pub use unix::UnixSocketTransport;

#[cfg(unix)]
mod unix {
    use super::*;
    use std::path::PathBuf;
    use tokio::net::UnixStream;

    /// Agent reached through a Unix domain socket
    #[derive(Debug, Clone)]
    pub struct UnixSocketTransport {
        path: PathBuf,
    }

    impl UnixSocketTransport {
        /// Transport for an explicit socket path
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        /// Transport for the socket named by `SSH_AUTH_SOCK`
        pub fn from_env() -> Result<Self, AgentError> {
            match std::env::var_os("SSH_AUTH_SOCK") {
                Some(path) if !path.is_empty() => Ok(Self::new(path)),
                _ => Err(AgentError::SocketNotConfigured),
            }
        }
    }

    #[async_trait]
    impl AgentTransport for UnixSocketTransport {
        async fn connect(&self) -> Result<AgentStream, AgentError> {
            let stream = UnixStream::connect(&self.path)
                .await
                .map_err(|source| AgentError::Connect {
                    endpoint: self.endpoint(),
                    source,
                })?;
            Ok(Box::new(stream))
        }

        fn capabilities(&self) -> TransportCapabilities {
            TransportCapabilities::FULL
        }

        fn endpoint(&self) -> String {
            self.path.display().to_string()
        }
    }
}

#[cfg(windows)]
pub use windows::{NamedPipeTransport, DEFAULT_PIPE_NAME};

#[cfg(windows)]
mod windows {
    use super::*;
    use std::time::Duration;
    use tokio::net::windows::named_pipe::ClientOptions;

    /// Pipe served by the Windows OpenSSH agent service
    pub const DEFAULT_PIPE_NAME: &str = r"\\.\pipe\openssh-ssh-agent";

    const ERROR_PIPE_BUSY: i32 = 231;
    const BUSY_RETRIES: u32 = 20;

    /// Agent reached through a named pipe
    #[derive(Debug, Clone)]
    pub struct NamedPipeTransport {
        name: String,
    }

    impl NamedPipeTransport {
        /// Transport for an explicit pipe name
        pub fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    impl Default for NamedPipeTransport {
        fn default() -> Self {
            Self::new(DEFAULT_PIPE_NAME)
        }
    }

    #[async_trait]
    impl AgentTransport for NamedPipeTransport {
        async fn connect(&self) -> Result<AgentStream, AgentError> {
            let mut attempts = 0;
            loop {
                match ClientOptions::new().open(&self.name) {
                    Ok(client) => return Ok(Box::new(client)),
                    Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) && attempts < BUSY_RETRIES => {
                        attempts += 1;
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Err(source) => {
                        return Err(AgentError::Connect {
                            endpoint: self.endpoint(),
                            source,
                        })
                    }
                }
            }
        }

        fn capabilities(&self) -> TransportCapabilities {
            TransportCapabilities::NONE
        }

        fn endpoint(&self) -> String {
            self.name.clone()
        }
    }
}

/// Transport for this platform.
///
/// `socket` overrides the platform default: `SSH_AUTH_SOCK` on unix, the
/// OpenSSH agent pipe on Windows.
pub fn default_transport(socket: Option<&Path>) -> Result<Arc<dyn AgentTransport>, AgentError> {
    #[cfg(unix)]
    {
        let transport = match socket {
            Some(path) => UnixSocketTransport::new(path),
            None => UnixSocketTransport::from_env()?,
        };
        Ok(Arc::new(transport))
    }

    #[cfg(windows)]
    {
        let transport = match socket {
            Some(path) => NamedPipeTransport::new(path.to_string_lossy()),
            None => NamedPipeTransport::default(),
        };
        Ok(Arc::new(transport))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = socket;
        Err(AgentError::SocketNotConfigured)
    }
}
