//! LDAP transport built on `ldap3` and tokio
//!
//! Implements [`DirectoryTransport`] for real directory servers. Result codes
//! from the server are carried in [`ProbeFailure::code`] so classification
//! can tell a rejected password from a busy server.

use crate::constants::{LDAP_RC_SIZE_LIMIT_EXCEEDED, LDAP_RC_SUCCESS};
use crate::core::{DirectorySession, DirectoryTransport, ProbeFailure, QuerySample};
use crate::models::{Credentials, DiagnosticTarget};
use async_trait::async_trait;
use ldap3::result::{LdapError, LdapResult, SearchResult};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};

/// Result codes that mean the server did not really speak LDAP to us
const HANDSHAKE_FAILURE_CODES: &[u32] = &[
    2,  // protocolError
    51, // busy
    52, // unavailable
];

const ROOT_DSE_ATTRS: &[&str] = &["defaultNamingContext", "namingContexts"];

#[derive(Debug, Clone, Copy, Default)]
pub struct LdapTransport;

impl LdapTransport {
    pub fn new() -> Self {
        LdapTransport
    }
}

fn ldap_failure(err: LdapError) -> ProbeFailure {
    match err {
        LdapError::LdapResult { result } => ProbeFailure::with_code(result.rc, result.text),
        other => ProbeFailure::new(other.to_string()),
    }
}

fn check(result: LdapResult) -> Result<(), ProbeFailure> {
    if result.rc == LDAP_RC_SUCCESS {
        Ok(())
    } else {
        Err(ProbeFailure::with_code(result.rc, result.text))
    }
}

#[async_trait]
impl DirectoryTransport for LdapTransport {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, ProbeFailure> {
        let resolved = lookup_host((host, port))
            .await
            .map_err(|e| ProbeFailure::new(format!("could not resolve {}: {}", host, e)))?;

        let mut seen = HashSet::new();
        Ok(resolved
            .map(|addr| addr.ip())
            .filter(|ip| seen.insert(*ip))
            .collect())
    }

    async fn ping(&self, addr: IpAddr, wait: Duration) -> Result<(), ProbeFailure> {
        super::ping::ping(addr, wait).await
    }

    async fn connect(&self, addrs: &[SocketAddr]) -> Result<(), ProbeFailure> {
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(_stream) => {
                    debug!(addr = %addr, "Port accepted connection");
                    return Ok(());
                }
                Err(e) => {
                    debug!(addr = %addr, error = %e, "Connect failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => ProbeFailure::from(e),
            None => ProbeFailure::new("no addresses to connect to"),
        })
    }

    async fn open_session(
        &self,
        target: &DiagnosticTarget,
    ) -> Result<Box<dyn DirectorySession>, ProbeFailure> {
        let url = target.ldap_url();
        debug!(url = %url, "Opening LDAP session");

        let settings = LdapConnSettings::new().set_conn_timeout(target.timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(ldap_failure)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        // Any answer to an anonymous bind proves the server speaks the protocol,
        // even a refusal; only these codes mean it cannot serve us
        let result = ldap.simple_bind("", "").await.map_err(ldap_failure)?;
        if HANDSHAKE_FAILURE_CODES.contains(&result.rc) {
            let _ = ldap.unbind().await;
            return Err(ProbeFailure::with_code(result.rc, result.text));
        }

        Ok(Box::new(LdapSession {
            ldap,
            host: target.host().to_string(),
        }))
    }
}

/// Open session over an `ldap3` handle
pub struct LdapSession {
    ldap: Ldap,
    #[cfg_attr(not(feature = "gssapi"), allow(dead_code))]
    host: String,
}

impl LdapSession {
    /// Bind as the identity of the running process
    #[cfg(feature = "gssapi")]
    async fn ambient_bind(&mut self) -> Result<(), ProbeFailure> {
        let result = self
            .ldap
            .sasl_gssapi_bind(&self.host)
            .await
            .map_err(ldap_failure)?;
        check(result)
    }

    #[cfg(not(feature = "gssapi"))]
    async fn ambient_bind(&mut self) -> Result<(), ProbeFailure> {
        let result = self.ldap.simple_bind("", "").await.map_err(ldap_failure)?;
        check(result)
    }

    async fn naming_context(&mut self) -> Result<Option<String>, ProbeFailure> {
        let SearchResult(entries, result) = self
            .ldap
            .search("", Scope::Base, "(objectClass=*)", ROOT_DSE_ATTRS.to_vec())
            .await
            .map_err(ldap_failure)?;
        check(result)?;

        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let entry = SearchEntry::construct(entry);
        let first = |name: &str| entry.attrs.get(name).and_then(|v| v.first()).cloned();
        Ok(first("defaultNamingContext").or_else(|| first("namingContexts")))
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(
        &mut self,
        credentials: Option<&Credentials>,
        domain: &str,
    ) -> Result<(), ProbeFailure> {
        let Some(creds) = credentials else {
            return self.ambient_bind().await;
        };

        let bind_name = creds.bind_name(domain);
        debug!(bind_name = %bind_name, "Performing LDAP bind");
        let result = self
            .ldap
            .simple_bind(&bind_name, creds.secret().as_str())
            .await
            .map_err(ldap_failure)?;
        check(result)
    }

    async fn sample(
        &mut self,
        base: Option<&str>,
        limit: i32,
    ) -> Result<QuerySample, ProbeFailure> {
        let naming_context = self.naming_context().await?;
        let Some(base) = base.map(str::to_string).or_else(|| naming_context.clone()) else {
            return Err(ProbeFailure::new(
                "no search base configured and the root entry advertises no naming context",
            ));
        };

        let SearchResult(entries, result) = self
            .ldap
            .with_search_options(SearchOptions::new().sizelimit(limit))
            .search(&base, Scope::OneLevel, "(objectClass=*)", vec!["1.1"])
            .await
            .map_err(ldap_failure)?;

        // Hitting our own size cap still proves the read works
        if result.rc != LDAP_RC_SUCCESS && result.rc != LDAP_RC_SIZE_LIMIT_EXCEEDED {
            return Err(ProbeFailure::with_code(result.rc, result.text));
        }

        Ok(QuerySample {
            naming_context,
            entries: entries.len(),
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "LDAP unbind failed");
        }
    }
}
