//! User-scoped encryption for the stored credential
//!
//! Windows uses DPAPI (`CryptProtectData`), which ties the blob to the
//! current user's logon secrets. Other platforms encrypt with AES-256-GCM
//! under a random key kept in a `0600` file next to the credential.

use crate::core::{FileSecretStore, SecretProtector};
use crate::utils::SecretStoreError;

/// Protector appropriate for the current platform
pub fn default_protector() -> Result<Box<dyn SecretProtector>, SecretStoreError> {
    #[cfg(windows)]
    {
        Ok(Box::new(DpapiProtector))
    }

    #[cfg(not(windows))]
    {
        let key_path = crate::paths::credential_key_file().ok_or(SecretStoreError::NoDataDir)?;
        Ok(Box::new(KeyFileProtector::new(key_path)))
    }
}

/// Secret store at the standard per-user location
pub fn default_secret_store() -> Result<FileSecretStore, SecretStoreError> {
    let path = crate::paths::credential_file().ok_or(SecretStoreError::NoDataDir)?;
    Ok(FileSecretStore::new(path, default_protector()?))
}

#[cfg(windows)]
pub use dpapi::DpapiProtector;

#[cfg(windows)]
mod dpapi {
    use super::*;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{LocalFree, HLOCAL};
    use windows::Win32::Security::Cryptography::{
        CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB,
    };

    /// DPAPI protection scoped to the current user
    pub struct DpapiProtector;

    fn input_blob(data: &[u8]) -> CRYPT_INTEGER_BLOB {
        CRYPT_INTEGER_BLOB {
            cbData: data.len() as u32,
            pbData: data.as_ptr() as *mut u8,
        }
    }

    /// Copy a DPAPI-allocated blob into a Vec and free the original
    ///
    /// # Safety
    /// `blob` must have been filled in by a successful DPAPI call.
    unsafe fn take_blob(blob: CRYPT_INTEGER_BLOB) -> Vec<u8> {
        let bytes = std::slice::from_raw_parts(blob.pbData, blob.cbData as usize).to_vec();
        let _ = LocalFree(HLOCAL(blob.pbData as *mut core::ffi::c_void));
        bytes
    }

    impl SecretProtector for DpapiProtector {
        fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretStoreError> {
            let input = input_blob(plaintext);
            let mut output = CRYPT_INTEGER_BLOB::default();

            unsafe {
                CryptProtectData(
                    &input,
                    PCWSTR::null(),
                    None,
                    None,
                    None,
                    CRYPTPROTECT_UI_FORBIDDEN,
                    &mut output,
                )
                .map_err(|e| SecretStoreError::Protect(e.message().to_string()))?;
                Ok(take_blob(output))
            }
        }

        fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, SecretStoreError> {
            let input = input_blob(blob);
            let mut output = CRYPT_INTEGER_BLOB::default();

            unsafe {
                CryptUnprotectData(
                    &input,
                    None,
                    None,
                    None,
                    None,
                    CRYPTPROTECT_UI_FORBIDDEN,
                    &mut output,
                )
                .map_err(|e| SecretStoreError::Unprotect(e.message().to_string()))?;
                Ok(take_blob(output))
            }
        }
    }
}

#[cfg(not(windows))]
pub use keyfile::KeyFileProtector;

#[cfg(not(windows))]
mod keyfile {
    use super::*;
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use rand::RngCore;
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};
    use std::path::{Path, PathBuf};
    use tracing::info;
    use zeroize::Zeroizing;

    const KEY_LEN: usize = 32;
    const NONCE_LEN: usize = 12;

    /// AES-256-GCM under a per-user random key file
    pub struct KeyFileProtector {
        key_path: PathBuf,
    }

    impl KeyFileProtector {
        pub fn new(key_path: impl Into<PathBuf>) -> Self {
            Self {
                key_path: key_path.into(),
            }
        }

        pub fn key_path(&self) -> &Path {
            &self.key_path
        }

        fn read_key(&self) -> Result<Option<Zeroizing<Vec<u8>>>, SecretStoreError> {
            match fs::read(&self.key_path) {
                Ok(bytes) if bytes.len() == KEY_LEN => Ok(Some(Zeroizing::new(bytes))),
                Ok(_) => Err(SecretStoreError::Unprotect("key file is corrupt".to_string())),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        fn create_key(&self) -> Result<Zeroizing<Vec<u8>>, SecretStoreError> {
            if let Some(parent) = self.key_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
            rand::thread_rng().fill_bytes(&mut key);

            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options.open(&self.key_path)?;
            file.write_all(&key)?;
            file.sync_all()?;

            info!(path = %self.key_path.display(), "Created credential encryption key");
            Ok(key)
        }

        fn cipher(key: &[u8]) -> Result<Aes256Gcm, SecretStoreError> {
            Aes256Gcm::new_from_slice(key)
                .map_err(|e| SecretStoreError::Protect(format!("invalid key: {}", e)))
        }
    }

    impl SecretProtector for KeyFileProtector {
        fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretStoreError> {
            let key = match self.read_key()? {
                Some(key) => key,
                None => self.create_key()?,
            };
            let cipher = Self::cipher(&key)?;

            let mut nonce_bytes = [0u8; NONCE_LEN];
            rand::thread_rng().fill_bytes(&mut nonce_bytes);
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
                .map_err(|e| SecretStoreError::Protect(e.to_string()))?;

            let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
            blob.extend_from_slice(&nonce_bytes);
            blob.extend(ciphertext);
            Ok(blob)
        }

        fn unprotect(&self, blob: &[u8]) -> Result<Vec<u8>, SecretStoreError> {
            if blob.len() <= NONCE_LEN {
                return Err(SecretStoreError::InvalidFormat);
            }
            let key = self
                .read_key()?
                .ok_or_else(|| SecretStoreError::Unprotect("no encryption key".to_string()))?;
            let cipher = Self::cipher(&key)?;

            let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| SecretStoreError::Unprotect("authentication failed".to_string()))
        }
    }

}
