//! Immutable snapshot of what a diagnostics run connects to.

use super::credentials::{format_base_dn, Credentials};
use std::time::Duration;

/// Target of a diagnostics run
///
/// Built once per run (see [`crate::config::DirectoryConfig::target`]) and
/// never mutated while the run is in progress. The credential is optional:
/// `None` means the ambient identity of the running process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticTarget {
    /// DNS domain, e.g. `corp.example.com`
    pub domain: String,
    /// Explicit server; takes precedence over `domain` for connecting
    pub server: Option<String>,
    pub port: u16,
    pub use_tls: bool,
    /// Bound applied to every individual network operation
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
    /// Partial credential input kept only so validation can report it
    pub partial_identity: Option<String>,
    pub base_dn: Option<String>,
}

impl DiagnosticTarget {
    pub fn new(domain: impl Into<String>, port: u16) -> Self {
        Self {
            domain: domain.into(),
            server: None,
            port,
            use_tls: false,
            timeout: Duration::from_secs(crate::constants::DEFAULT_TIMEOUT_SECS),
            credentials: None,
            partial_identity: None,
            base_dn: None,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_base_dn(mut self, base_dn: impl Into<String>) -> Self {
        self.base_dn = Some(base_dn.into());
        self
    }

    /// Host to resolve and connect to: the explicit server if set, else the domain
    pub fn host(&self) -> &str {
        match self.server.as_deref().map(str::trim) {
            Some(server) if !server.is_empty() => server,
            _ => self.domain.trim(),
        }
    }

    /// Search base for the representative query
    pub fn search_base(&self) -> Option<String> {
        match self.base_dn.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => Some(base.to_string()),
            _ => format_base_dn(&self.domain),
        }
    }

    /// URL for the directory protocol session
    pub fn ldap_url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host(), self.port)
    }

    /// Local configuration checks; returns every violation found
    ///
    /// Runs before any network activity. An empty list means the target is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.host().is_empty() {
            problems.push("Neither a server nor a domain name is configured".to_string());
        }

        if self.port == 0 {
            problems.push("Port must be between 1 and 65535".to_string());
        }

        if self.timeout.is_zero() {
            problems.push("Timeout must be greater than zero".to_string());
        }

        if self.partial_identity.is_some() {
            problems.push(
                "Identity and secret must be supplied together or both left empty".to_string(),
            );
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_prefers_explicit_server() {
        let target = DiagnosticTarget::new("corp.local", 389).with_server("dc01.corp.local");
        assert_eq!(target.host(), "dc01.corp.local");

        let target = DiagnosticTarget::new("corp.local", 389).with_server("   ");
        assert_eq!(target.host(), "corp.local");
    }

    #[test]
    fn ldap_url_reflects_tls() {
        let target = DiagnosticTarget::new("corp.local", 636).with_tls(true);
        assert_eq!(target.ldap_url(), "ldaps://corp.local:636");

        let target = DiagnosticTarget::new("corp.local", 389);
        assert_eq!(target.ldap_url(), "ldap://corp.local:389");
    }

    #[test]
    fn search_base_falls_back_to_domain() {
        let target = DiagnosticTarget::new("corp.example.com", 389);
        assert_eq!(
            target.search_base().as_deref(),
            Some("DC=corp,DC=example,DC=com")
        );

        let target = target.with_base_dn("OU=Staff,DC=corp,DC=example,DC=com");
        assert_eq!(
            target.search_base().as_deref(),
            Some("OU=Staff,DC=corp,DC=example,DC=com")
        );
    }

    #[test]
    fn validate_reports_each_problem() {
        let target = DiagnosticTarget::new("", 0).with_timeout(Duration::ZERO);
        let problems = target.validate();
        assert_eq!(problems.len(), 3);

        let mut partial = DiagnosticTarget::new("corp.local", 389);
        partial.partial_identity = Some("alice".to_string());
        assert_eq!(partial.validate().len(), 1);

        assert!(DiagnosticTarget::new("corp.local", 389).validate().is_empty());
    }
}
