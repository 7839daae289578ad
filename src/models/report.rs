//! Diagnostics report: one boolean outcome per pipeline stage.

use super::failure::{ClassifiedFailure, FailureKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ConfigurationValid,
    NameResolved,
    NetworkReachable,
    PortOpen,
    ProtocolConnected,
    Authenticated,
    QuerySucceeded,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::ConfigurationValid,
        Stage::NameResolved,
        Stage::NetworkReachable,
        Stage::PortOpen,
        Stage::ProtocolConnected,
        Stage::Authenticated,
        Stage::QuerySucceeded,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::ConfigurationValid => "configuration",
            Stage::NameResolved => "name resolution",
            Stage::NetworkReachable => "reachability",
            Stage::PortOpen => "port connectivity",
            Stage::ProtocolConnected => "protocol handshake",
            Stage::Authenticated => "authentication",
            Stage::QuerySucceeded => "directory query",
        }
    }

    /// Soft stages record their outcome but never halt the pipeline
    pub fn is_soft(&self) -> bool {
        matches!(self, Stage::NetworkReachable)
    }

    /// Failure class used when an error signal matches nothing in the table
    pub fn fallback_failure(&self) -> FailureKind {
        match self {
            Stage::ConfigurationValid => FailureKind::ConfigurationInvalid,
            Stage::NameResolved => FailureKind::NameResolutionFailed,
            Stage::NetworkReachable => FailureKind::HostUnreachable,
            Stage::PortOpen => FailureKind::PortUnreachable,
            Stage::ProtocolConnected | Stage::Authenticated | Stage::QuerySucceeded => {
                FailureKind::Unknown
            }
        }
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    /// False when an earlier hard failure stopped the pipeline
    pub attempted: bool,
    pub succeeded: bool,
    pub elapsed_ms: u64,
    pub failure: Option<ClassifiedFailure>,
}

impl StageOutcome {
    pub fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            attempted: false,
            succeeded: false,
            elapsed_ms: 0,
            failure: None,
        }
    }

    pub fn passed(stage: Stage, elapsed_ms: u64) -> Self {
        Self {
            stage,
            attempted: true,
            succeeded: true,
            elapsed_ms,
            failure: None,
        }
    }

    pub fn failed(stage: Stage, elapsed_ms: u64, failure: ClassifiedFailure) -> Self {
        Self {
            stage,
            attempted: true,
            succeeded: false,
            elapsed_ms,
            failure: Some(failure),
        }
    }
}

/// Result of one diagnostics run
///
/// Always holds exactly one outcome per [`Stage`], in pipeline order. Stages
/// that never ran are recorded as not attempted and not succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageOutcome>,
    /// Addresses returned by name resolution
    pub resolved_addresses: Vec<String>,
    /// Naming context reported by the server's root entry
    pub naming_context: Option<String>,
    /// Entries returned by the capped sample read
    pub sampled_entries: Option<usize>,
    pub fully_operational: bool,
}

impl DiagnosticReport {
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls,
            started_at: Utc::now(),
            stages: Stage::ALL.iter().copied().map(StageOutcome::skipped).collect(),
            resolved_addresses: Vec::new(),
            naming_context: None,
            sampled_entries: None,
            fully_operational: false,
        }
    }

    /// Record a stage outcome
    ///
    /// Outcomes must arrive in pipeline order; a stage may only be recorded
    /// after every earlier stage was attempted.
    pub(crate) fn record(&mut self, outcome: StageOutcome) {
        let idx = outcome.stage.index();
        debug_assert!(
            self.stages[..idx].iter().all(|s| s.attempted),
            "stage {:?} recorded out of order",
            outcome.stage
        );
        self.stages[idx] = outcome;
        self.fully_operational = self.stages.iter().all(|s| s.succeeded);
    }

    pub fn stage(&self, stage: Stage) -> &StageOutcome {
        &self.stages[stage.index()]
    }

    /// Boolean outcome of one stage; unattempted stages are false
    pub fn outcome(&self, stage: Stage) -> bool {
        self.stage(stage).succeeded
    }

    /// Logical AND of all seven outcomes, including the soft reachability probe
    pub fn fully_operational(&self) -> bool {
        self.fully_operational
    }

    /// True when every hard stage up to and including `last` succeeded
    ///
    /// Soft stages are ignored: this is the gate used to decide whether a
    /// credential is usable, which is looser than [`Self::fully_operational`].
    pub fn succeeded_through(&self, last: Stage) -> bool {
        self.stages
            .iter()
            .filter(|s| s.stage <= last && !s.stage.is_soft())
            .all(|s| s.succeeded)
    }

    /// First hard failure, i.e. the one that stopped the pipeline
    pub fn failure(&self) -> Option<&ClassifiedFailure> {
        self.stages
            .iter()
            .filter(|s| !s.stage.is_soft())
            .find_map(|s| s.failure.as_ref())
    }

    /// Failures recorded by soft stages
    pub fn warnings(&self) -> Vec<&ClassifiedFailure> {
        self.stages
            .iter()
            .filter(|s| s.stage.is_soft())
            .filter_map(|s| s.failure.as_ref())
            .collect()
    }

    /// Plain-text rendering for consoles and log files
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        let _ = writeln!(
            out,
            "Diagnostics for {}://{}:{} ({})",
            scheme,
            self.host,
            self.port,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        for outcome in &self.stages {
            let mark = match (outcome.attempted, outcome.succeeded) {
                (false, _) => "SKIP",
                (true, true) => " OK ",
                (true, false) if outcome.stage.is_soft() => "WARN",
                (true, false) => "FAIL",
            };
            let _ = write!(out, "  [{}] {:<20}", mark, outcome.stage.label());
            if outcome.attempted {
                let _ = write!(out, " {:>6} ms", outcome.elapsed_ms);
            }
            if let Some(failure) = &outcome.failure {
                let _ = write!(out, "  {}", failure);
            }
            out.push('\n');
        }

        if !self.resolved_addresses.is_empty() {
            let _ = writeln!(out, "  Addresses: {}", self.resolved_addresses.join(", "));
        }
        if let Some(context) = &self.naming_context {
            let _ = writeln!(out, "  Naming context: {}", context);
        }
        if let Some(count) = self.sampled_entries {
            let _ = writeln!(out, "  Sampled entries: {}", count);
        }

        let _ = writeln!(
            out,
            "Fully operational: {}",
            if self.fully_operational { "yes" } else { "no" }
        );

        if let Some(failure) = self.failure() {
            let _ = writeln!(out, "\n{}", failure.remediation());
        } else if let Some(warning) = self.warnings().first() {
            let _ = writeln!(out, "\n{}", warning.remediation());
        }

        out
    }
}
