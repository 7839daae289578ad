//! Credential types for directory binds
//!
//! SECURITY: Secret types zero their memory on drop.

use crate::constants::MAX_IDENTITY_LENGTH;
use crate::utils::CredentialError;
use std::fmt;
use zeroize::Zeroize;

/// Directory identity in one of the accepted formats
///
/// Valid formats:
/// - `user` (bare name, qualified with the configured domain at bind time)
/// - `DOMAIN\\user` (down-level logon name)
/// - `user@domain.com` (UPN format)
/// - `CN=user,OU=...,DC=...` (distinguished name)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    /// Create a new identity after validation
    pub fn new(identity: impl Into<String>) -> Result<Self, CredentialError> {
        let identity = identity.into().trim().to_string();

        if identity.is_empty() {
            return Err(CredentialError::InvalidIdentity(
                "Identity cannot be empty".to_string(),
            ));
        }

        if identity.chars().count() > MAX_IDENTITY_LENGTH {
            return Err(CredentialError::InvalidIdentity(format!(
                "Identity exceeds maximum length ({})",
                MAX_IDENTITY_LENGTH
            )));
        }

        if identity.chars().any(char::is_control) {
            return Err(CredentialError::InvalidIdentity(
                "Identity contains control characters".to_string(),
            ));
        }

        Ok(Identity(identity))
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the identity already names its domain or is a full DN
    pub fn is_qualified(&self) -> bool {
        self.0.contains('@') || self.0.contains('\\') || self.0.contains('=')
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Identity {
    type Error = CredentialError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identity::new(value)
    }
}

/// Secret that zeros memory on drop
///
/// SECURITY: This type never implements Display, and Debug only shows the length.
#[derive(Clone)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(secret: impl Into<String>) -> Self {
        SecureString(secret.into())
    }

    /// Get the secret as a string slice
    ///
    /// Use this sparingly and only when necessary for API calls.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(*** {} bytes ***)", self.0.len())
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecureString {}

/// Identity and secret used to bind to the directory
///
/// A credential is never half-specified: both parts are always present.
/// "No credential" is expressed as `Option<Credentials>::None` and means the
/// ambient identity of the running process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    identity: Identity,
    secret: SecureString,
}

impl Credentials {
    /// Create new credentials, rejecting an empty secret
    pub fn new(identity: Identity, secret: SecureString) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::Incomplete);
        }
        Ok(Credentials { identity, secret })
    }

    /// Build credentials from raw strings as typed by a user or read from config
    pub fn from_parts(identity: &str, secret: &str) -> Result<Self, CredentialError> {
        if identity.trim().is_empty() || secret.is_empty() {
            return Err(CredentialError::Incomplete);
        }
        Credentials::new(Identity::new(identity)?, SecureString::new(secret))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn secret(&self) -> &SecureString {
        &self.secret
    }

    /// Name presented in a simple bind
    ///
    /// Bare names are qualified as `user@domain`; qualified names are used as-is.
    pub fn bind_name(&self, domain: &str) -> String {
        let domain = domain.trim();
        if self.identity.is_qualified() || domain.is_empty() {
            self.identity.as_str().to_string()
        } else {
            format!("{}@{}", self.identity.as_str(), domain)
        }
    }
}

/// Format a domain like "contoso.com" into "DC=contoso,DC=com"
pub fn format_base_dn(domain: &str) -> Option<String> {
    let parts: Vec<&str> = domain
        .split('.')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(
        parts
            .into_iter()
            .map(|p| format!("DC={}", p))
            .collect::<Vec<String>>()
            .join(","),
    )
}
