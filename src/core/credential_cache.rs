//! In-memory holder of the currently accepted credential
//!
//! The in-memory value is authoritative for the running process; the
//! [`SecretStore`] only carries it across runs. Persistence failures are
//! logged and swallowed so a read-only profile never blocks a session.

use super::secret_store::SecretStore;
use crate::models::Credentials;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub struct CredentialCache {
    current: Mutex<Option<Credentials>>,
    /// Service account supplied by configuration, if any
    configured: Option<Credentials>,
    store: Arc<dyn SecretStore>,
}

impl CredentialCache {
    /// Create the cache, priming it from `store`
    pub fn new(store: Arc<dyn SecretStore>, configured: Option<Credentials>) -> Self {
        let current = store.try_load();
        if let Some(creds) = &current {
            debug!(identity = %creds.identity(), "Loaded cached credential from secret store");
        }

        Self {
            current: Mutex::new(current),
            configured,
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credentials>> {
        self.current.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// True if a credential is cached or configuration supplies one
    pub fn has_credential(&self) -> bool {
        self.lock().is_some() || self.configured.is_some()
    }

    /// Current credential, falling back to (and caching) the configured one
    pub fn get(&self) -> Option<Credentials> {
        let mut current = self.lock();
        if current.is_none() {
            if let Some(configured) = &self.configured {
                debug!(identity = %configured.identity(), "Using configured service account");
                *current = Some(configured.clone());
            }
        }
        current.clone()
    }

    /// Replace the credential in memory, then try to persist it
    pub fn set(&self, credentials: Credentials) {
        let identity = credentials.identity().clone();
        *self.lock() = Some(credentials.clone());

        match self.store.save(&credentials) {
            Ok(()) => info!(identity = %identity, "Credential cached"),
            Err(e) => warn!(
                identity = %identity,
                error = %e,
                "Failed to persist credential; it stays usable for this session"
            ),
        }
    }

    /// Drop the credential from memory and from the secret store
    pub fn clear(&self) {
        *self.lock() = None;

        match self.store.delete() {
            Ok(()) => info!("Cached credential cleared"),
            Err(e) => warn!(error = %e, "Failed to delete stored credential"),
        }
    }
}
