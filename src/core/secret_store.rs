//! Encrypted persistence for a single credential
//!
//! The credential is written as `identity + separator + secret` (UTF-8),
//! encrypted by a user-scoped [`SecretProtector`] and stored in one file.
//! Loading never fails loudly: a missing, corrupt, foreign or undecryptable
//! file all mean "no usable cached credential".

use crate::constants::CREDENTIAL_SEPARATOR;
use crate::models::Credentials;
use crate::utils::SecretStoreError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// User-scoped symmetric protection of a byte blob
///
/// Implementations handle platform-specific key management (DPAPI on
/// Windows, a per-user key file elsewhere). Decryption must only succeed
/// for the account that encrypted the blob.
pub trait SecretProtector: Send + Sync {
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretStoreError>;

    fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, SecretStoreError>;
}

/// Persistent storage for the one cached credential
pub trait SecretStore: Send + Sync {
    /// Replace any stored credential with `credentials`
    ///
    /// # Security
    /// - MUST store the secret encrypted
    /// - MUST NOT log the secret
    fn save(&self, credentials: &Credentials) -> Result<(), SecretStoreError>;

    /// Load the stored credential; every failure reads as `None`
    fn try_load(&self) -> Option<Credentials>;

    /// Remove the stored credential (idempotent)
    fn delete(&self) -> Result<(), SecretStoreError>;
}

/// [`SecretStore`] backed by one encrypted file
pub struct FileSecretStore {
    path: PathBuf,
    protector: Box<dyn SecretProtector>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>, protector: Box<dyn SecretProtector>) -> Self {
        Self {
            path: path.into(),
            protector,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(credentials: &Credentials) -> Zeroizing<Vec<u8>> {
        let mut plain = String::with_capacity(
            credentials.identity().as_str().len() + credentials.secret().len() + 1,
        );
        plain.push_str(credentials.identity().as_str());
        plain.push(CREDENTIAL_SEPARATOR);
        plain.push_str(credentials.secret().as_str());
        Zeroizing::new(plain.into_bytes())
    }

    fn decode(plain: &[u8]) -> Result<Credentials, SecretStoreError> {
        let text = std::str::from_utf8(plain).map_err(|_| SecretStoreError::InvalidFormat)?;
        let (identity, secret) = text
            .split_once(CREDENTIAL_SEPARATOR)
            .ok_or(SecretStoreError::InvalidFormat)?;
        Credentials::from_parts(identity, secret).map_err(|_| SecretStoreError::InvalidFormat)
    }

    fn load(&self) -> Result<Option<Credentials>, SecretStoreError> {
        let blob = match fs::read(&self.path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let plain = Zeroizing::new(self.protector.unprotect(&blob)?);
        Self::decode(&plain).map(Some)
    }

    /// Whole-file replace: write a sibling temp file, then rename over the target
    fn write_atomic(&self, blob: &[u8]) -> Result<(), SecretStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, blob)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn save(&self, credentials: &Credentials) -> Result<(), SecretStoreError> {
        let plain = Self::encode(credentials);
        let blob = self.protector.protect(&plain)?;
        self.write_atomic(&blob)?;
        debug!(
            path = %self.path.display(),
            identity = %credentials.identity(),
            "Saved credential"
        );
        Ok(())
    }

    fn try_load(&self) -> Option<Credentials> {
        match self.load() {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Stored credential is unusable; treating as absent"
                );
                None
            }
        }
    }

    fn delete(&self) -> Result<(), SecretStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Deleted stored credential");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
