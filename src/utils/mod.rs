//! # Utilities Module
//!
//! Cross-cutting concerns shared by the `core` and `platform` modules.
//!
//! ## Modules
//!
//! - [`errors`]: Typed error hierarchy using `thiserror` for domain-specific errors
//!
//! ## Design Notes
//!
//! Error types are defined here to avoid circular dependencies between
//! `core` and `platform`. Network and protocol failures are deliberately
//! absent: the diagnostics engine turns them into classified outcomes
//! (see [`crate::core::classify`]) instead of propagating them.

pub mod errors;

pub use errors::{ConfigError, CredentialError, SecretStoreError};
