//! Network abstraction for the diagnostics engine
//!
//! These traits allow testing without real servers by supporting mock
//! implementations. The real implementation lives in [`crate::platform::ldap`].
//! Implementations do not enforce timeouts themselves: the engine races every
//! call against the target's timeout.

use super::classify::ProbeFailure;
use crate::models::{Credentials, DiagnosticTarget};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// What the representative read returned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySample {
    /// `defaultNamingContext` (or first `namingContexts` value) of the root entry
    pub naming_context: Option<String>,
    /// Entries returned by the capped listing
    pub entries: usize,
}

/// Transport-level operations, one per pre-session stage
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Resolve `host` to addresses
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, ProbeFailure>;

    /// Echo probe; `wait` is the bound the probe itself should use
    async fn ping(&self, addr: IpAddr, wait: Duration) -> Result<(), ProbeFailure>;

    /// Open and immediately close a transport connection to one of `addrs`
    async fn connect(&self, addrs: &[SocketAddr]) -> Result<(), ProbeFailure>;

    /// Open a protocol session (TLS if requested) and perform an anonymous bind
    async fn open_session(
        &self,
        target: &DiagnosticTarget,
    ) -> Result<Box<dyn DirectorySession>, ProbeFailure>;
}

/// An open directory protocol session
#[async_trait]
pub trait DirectorySession: Send {
    /// Bind with `credentials`, or with the process identity when `None`
    async fn bind(
        &mut self,
        credentials: Option<&Credentials>,
        domain: &str,
    ) -> Result<(), ProbeFailure>;

    /// Read the root entry and a capped listing under `base`
    async fn sample(&mut self, base: Option<&str>, limit: i32)
        -> Result<QuerySample, ProbeFailure>;

    /// Unbind; errors are ignored
    async fn close(&mut self);
}
