//! # Domain Models
//!
//! Core data structures: credentials, the diagnostics target snapshot, the
//! failure taxonomy and the diagnostics report.
//!
//! ## Security Design
//!
//! The [`SecureString`] type provides memory-safe secret handling:
//! - Secret data is zeroed on drop to prevent leakage via swap/core dumps
//! - Never exposed in `Debug` or `Display` implementations
//!
//! Credentials are persisted only through [`crate::core::SecretStore`],
//! encrypted with a user-scoped key, never in plaintext files or logs.

pub mod credentials;
pub mod failure;
pub mod report;
pub mod target;

pub use credentials::{format_base_dn, Credentials, Identity, SecureString};
pub use failure::{ClassifiedFailure, FailureKind};
pub use report::{DiagnosticReport, Stage, StageOutcome};
pub use target::DiagnosticTarget;
