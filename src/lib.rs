//! DirProbe - directory service connection bootstrap and diagnostics
//!
//! Core library exposing platform-agnostic types and traits, plus the
//! platform implementations (LDAP transport, credential encryption).

// Public modules
pub mod config;
pub mod constants;
pub mod core;
pub mod logger;
pub mod models;
pub mod paths;
pub mod platform;
pub mod utils;

// Re-export commonly used types
pub use config::DirectoryConfig;
pub use core::{
    BootstrapAuthenticator, BootstrapOptions, BootstrapOutcome, CredentialCache,
    CredentialCollector, DiagnosticsEngine, SecretStore,
};
pub use models::{
    Credentials, DiagnosticReport, DiagnosticTarget, FailureKind, Identity, SecureString, Stage,
};
pub use utils::{ConfigError, CredentialError, SecretStoreError};
