//! Core business logic (platform-agnostic)
//!
//! CRITICAL: This module MUST NOT import platform-specific code or UI frameworks.
//! Network access goes through [`DirectoryTransport`], encryption through
//! [`SecretProtector`], and user interaction through [`CredentialCollector`].

pub mod bootstrap;
pub mod classify;
pub mod collector;
pub mod credential_cache;
pub mod diagnostics;
pub mod events;
pub mod secret_store;
pub mod transport;

// Scripted transport for engine and bootstrap tests (tests only)
#[cfg(test)]
pub mod mock_transport;

pub use bootstrap::{
    BootstrapAuthenticator, BootstrapOptions, BootstrapOutcome, BootstrapRun, BootstrapState,
};
pub use classify::{classify, classify_signal, ProbeFailure};
pub use collector::{
    ChannelCollector, CollectOutcome, CollectorRequest, CredentialCollector, CredentialPrompt,
};
pub use credential_cache::CredentialCache;
pub use diagnostics::{ConnectivityProbe, DiagnosticsEngine};
pub use events::{DiagnosticsSink, NullSink, StageEvent, TracingSink};
pub use secret_store::{FileSecretStore, SecretProtector, SecretStore};
pub use transport::{DirectorySession, DirectoryTransport, QuerySample};
