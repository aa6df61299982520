//! On-disk credential store
//!
//! An identity named `name` lives in the SSH directory as two files:
//! the private key `<name>` and the certificate `<name>-cert.pub`.
//! Fresh identities are written by the login flow into a staging
//! directory inside the SSH directory and renamed into place from there,
//! which keeps every rename on one filesystem.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::CommitError;
use crate::time::elapsed_since;
use crate::types::IdentityAge;

/// Suffix of the certificate file
pub const CERTIFICATE_SUFFIX: &str = "-cert.pub";

/// Default SSH directory (`~/.ssh`)
pub fn default_ssh_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh"))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Paths of one identity's files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFiles {
    /// Private key
    pub private_key: PathBuf,
    /// Certificate in authorized-key text format
    pub certificate: PathBuf,
}

impl IdentityFiles {
    /// Paths for `name` inside `dir`
    pub fn new(dir: &Path, name: &str) -> Self {
        Self::for_key(dir.join(name))
    }

    /// Paths derived from a private key path
    pub fn for_key(private_key: PathBuf) -> Self {
        let certificate = with_suffix(&private_key, CERTIFICATE_SUFFIX);
        Self {
            private_key,
            certificate,
        }
    }

    /// `<key>.pub`, where the login flow writes its certificate
    pub fn public_key(&self) -> PathBuf {
        with_suffix(&self.private_key, ".pub")
    }
}

/// Temporary directory receiving a freshly issued identity
///
/// The directory and everything in it is removed on drop.
#[derive(Debug)]
pub struct StagingArea {
    dir: Option<TempDir>,
    path: PathBuf,
    files: IdentityFiles,
}

impl StagingArea {
    /// Staging directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Paths the login flow should write to
    pub fn files(&self) -> &IdentityFiles {
        &self.files
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::debug!("Removed staging directory {:?}", self.path),
                Err(e) => {
                    tracing::warn!("Failed to remove staging directory {:?}: {}", self.path, e)
                }
            }
        }
    }
}

/// Identity files in one SSH directory
#[derive(Debug, Clone)]
pub struct CredentialStore {
    ssh_dir: PathBuf,
}

impl CredentialStore {
    /// Create a store rooted at `ssh_dir`
    pub fn new(ssh_dir: impl Into<PathBuf>) -> Self {
        Self {
            ssh_dir: ssh_dir.into(),
        }
    }

    /// SSH directory this store manages
    pub fn ssh_dir(&self) -> &Path {
        &self.ssh_dir
    }

    /// Canonical paths for `name`
    pub fn files(&self, name: &str) -> IdentityFiles {
        IdentityFiles::new(&self.ssh_dir, name)
    }

    /// Age of the private key for `name`.
    ///
    /// A missing key is `IdentityAge::Missing`; any other stat failure is
    /// returned as an error.
    pub fn age(&self, name: &str) -> io::Result<IdentityAge> {
        let files = self.files(name);
        match fs::metadata(&files.private_key) {
            Ok(metadata) => Ok(IdentityAge::Present(elapsed_since(metadata.modified()?))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(IdentityAge::Missing),
            Err(e) => Err(e),
        }
    }

    /// Create a staging directory for a new identity called `name`
    pub fn prepare_staging(&self, name: &str) -> io::Result<StagingArea> {
        self.ensure_ssh_dir()?;

        let dir = tempfile::Builder::new()
            .prefix(name)
            .tempdir_in(&self.ssh_dir)?;
        let files = IdentityFiles::new(dir.path(), name);
        tracing::debug!("Created staging directory {:?}", dir.path());

        Ok(StagingArea {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
            files,
        })
    }

    /// Rename the login flow's `<key>.pub` output to `<key>-cert.pub`
    pub fn promote_certificate(&self, staged: &IdentityFiles) -> io::Result<()> {
        fs::rename(staged.public_key(), &staged.certificate)
    }

    /// Move a staged key pair into place under `name`.
    ///
    /// The key is renamed first, then the certificate. If the second rename
    /// fails the first is not undone.
    pub fn commit(&self, staged: &IdentityFiles, name: &str) -> Result<IdentityFiles, CommitError> {
        let target = self.files(name);

        fs::rename(&staged.private_key, &target.private_key).map_err(|source| {
            CommitError::PrivateKey {
                from: staged.private_key.clone(),
                to: target.private_key.clone(),
                source,
            }
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            if let Err(e) = fs::set_permissions(&target.private_key, permissions) {
                tracing::warn!(
                    "Failed to restrict permissions on {:?}: {}",
                    target.private_key,
                    e
                );
            }
        }

        fs::rename(&staged.certificate, &target.certificate).map_err(|source| {
            CommitError::Torn {
                key: target.private_key.clone(),
                certificate: target.certificate.clone(),
                source,
            }
        })?;

        Ok(target)
    }

    fn ensure_ssh_dir(&self) -> io::Result<()> {
        if self.ssh_dir.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.ssh_dir)
    }
}
