//! Error types for DirProbe
//!
//! All error types use thiserror for clean error handling.
//! SECURITY: Error messages MUST NOT contain passwords or sensitive data.

/// Errors from the encrypted credential file
#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    #[error("No local application-data directory is available")]
    NoDataDir,

    #[error("Credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to protect credential: {0}")]
    Protect(String),

    #[error("Failed to unprotect credential: {0}")]
    Unprotect(String),

    #[error("Stored credential has an invalid format")]
    InvalidFormat,
}

/// Errors from building credential values
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Credential is incomplete: identity and secret must both be supplied")]
    Incomplete,
}

/// Errors from loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("No local application-data directory is available")]
    NoDataDir,
}
