//! External login flow trait

use async_trait::async_trait;
use std::path::Path;

use crate::error::LoginError;

/// Interactive login that issues a fresh key and certificate
#[async_trait]
pub trait LoginFlow: Send + Sync {
    /// Write a private key to `key_path` and its certificate to `<key_path>.pub`.
    ///
    /// Callers bound this with a timeout; dropping the future must abandon
    /// the login.
    async fn login(&self, key_path: &Path) -> Result<(), LoginError>;
}
