//! Scripted directory transport for testing without real servers
//!
//! Every operation follows a configurable [`MockBehavior`] and increments a
//! shared call counter, so tests can assert both outcomes and which stages
//! were actually invoked.

use super::classify::ProbeFailure;
use super::transport::{DirectorySession, DirectoryTransport, QuerySample};
use crate::models::{Credentials, DiagnosticTarget};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a mocked operation behaves
#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    Succeed,
    Fail(&'static str),
    FailCode(u32, &'static str),
    /// Never completes; the engine's timer has to win
    Hang,
    /// Succeeds with no data (only meaningful for resolution)
    Empty,
}

impl MockBehavior {
    async fn play(self) -> Result<(), ProbeFailure> {
        match self {
            MockBehavior::Succeed | MockBehavior::Empty => Ok(()),
            MockBehavior::Fail(message) => Err(ProbeFailure::new(message)),
            MockBehavior::FailCode(code, message) => Err(ProbeFailure::with_code(code, message)),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Per-operation invocation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub resolve: u32,
    pub ping: u32,
    pub connect: u32,
    pub open: u32,
    pub bind: u32,
    pub sample: u32,
    pub close: u32,
}

impl CallCounts {
    pub fn total(&self) -> u32 {
        self.resolve + self.ping + self.connect + self.open + self.bind + self.sample + self.close
    }
}

pub struct MockTransport {
    resolve: MockBehavior,
    ping: MockBehavior,
    connect: MockBehavior,
    open: MockBehavior,
    bind: MockBehavior,
    sample: MockBehavior,
    /// When set, binds succeed only with this secret (rc 49 otherwise)
    accepted_secret: Option<String>,
    counts: Arc<Mutex<CallCounts>>,
}

impl MockTransport {
    /// Every operation succeeds
    pub fn healthy() -> Self {
        Self {
            resolve: MockBehavior::Succeed,
            ping: MockBehavior::Succeed,
            connect: MockBehavior::Succeed,
            open: MockBehavior::Succeed,
            bind: MockBehavior::Succeed,
            sample: MockBehavior::Succeed,
            accepted_secret: None,
            counts: Arc::new(Mutex::new(CallCounts::default())),
        }
    }

    /// Healthy server that only accepts one secret
    pub fn accepting(secret: &str) -> Self {
        Self {
            accepted_secret: Some(secret.to_string()),
            ..Self::healthy()
        }
    }

    pub fn resolve(mut self, behavior: MockBehavior) -> Self {
        self.resolve = behavior;
        self
    }

    pub fn ping(mut self, behavior: MockBehavior) -> Self {
        self.ping = behavior;
        self
    }

    pub fn connect(mut self, behavior: MockBehavior) -> Self {
        self.connect = behavior;
        self
    }

    pub fn open(mut self, behavior: MockBehavior) -> Self {
        self.open = behavior;
        self
    }

    pub fn bind(mut self, behavior: MockBehavior) -> Self {
        self.bind = behavior;
        self
    }

    pub fn sample(mut self, behavior: MockBehavior) -> Self {
        self.sample = behavior;
        self
    }

    pub fn calls(&self) -> CallCounts {
        *self.counts.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn count(&self, f: impl FnOnce(&mut CallCounts)) {
        f(&mut self.counts.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

#[async_trait]
impl DirectoryTransport for MockTransport {
    async fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<IpAddr>, ProbeFailure> {
        self.count(|c| c.resolve += 1);
        self.resolve.play().await?;
        if matches!(self.resolve, MockBehavior::Empty) {
            return Ok(Vec::new());
        }
        Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10))])
    }

    async fn ping(&self, _addr: IpAddr, _wait: Duration) -> Result<(), ProbeFailure> {
        self.count(|c| c.ping += 1);
        self.ping.play().await
    }

    async fn connect(&self, _addrs: &[SocketAddr]) -> Result<(), ProbeFailure> {
        self.count(|c| c.connect += 1);
        self.connect.play().await
    }

    async fn open_session(
        &self,
        _target: &DiagnosticTarget,
    ) -> Result<Box<dyn DirectorySession>, ProbeFailure> {
        self.count(|c| c.open += 1);
        self.open.play().await?;
        Ok(Box::new(MockSession {
            bind: self.bind,
            sample: self.sample,
            accepted_secret: self.accepted_secret.clone(),
            counts: self.counts.clone(),
        }))
    }
}

struct MockSession {
    bind: MockBehavior,
    sample: MockBehavior,
    accepted_secret: Option<String>,
    counts: Arc<Mutex<CallCounts>>,
}

impl MockSession {
    fn count(&self, f: impl FnOnce(&mut CallCounts)) {
        f(&mut self.counts.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn bind(
        &mut self,
        credentials: Option<&Credentials>,
        _domain: &str,
    ) -> Result<(), ProbeFailure> {
        self.count(|c| c.bind += 1);
        self.bind.play().await?;
        match (&self.accepted_secret, credentials) {
            (Some(expected), Some(creds)) if creds.secret().as_str() == expected => Ok(()),
            (Some(_), _) => Err(ProbeFailure::with_code(
                49,
                "80090308: LdapErr: DSID-0C09042A, comment: AcceptSecurityContext error, data 52e, v3839",
            )),
            (None, _) => Ok(()),
        }
    }

    async fn sample(
        &mut self,
        _base: Option<&str>,
        limit: i32,
    ) -> Result<QuerySample, ProbeFailure> {
        self.count(|c| c.sample += 1);
        self.sample.play().await?;
        Ok(QuerySample {
            naming_context: Some("DC=corp,DC=local".to_string()),
            entries: 3.min(limit.max(0) as usize),
        })
    }

    async fn close(&mut self) {
        self.count(|c| c.close += 1);
    }
}
