//! Start-up authentication
//!
//! Drives the credential bootstrap as an explicit state machine:
//!
//! ```text
//! Init -> TryCached -> Success
//!  |           \-> NeedsInteractive -> InteractiveAttempt(n) -> Success
//!  |                     ^                      |
//!  |                     \---- confirm_retry ---+  (n < max_attempts)
//!  |                                            \-> Exhausted
//!  \-> ConfigurationInvalid
//! ```
//!
//! `confirm_retry` is only asked after a rejected attempt below
//! `max_attempts`. The rejection that reaches the bound goes straight to
//! `Exhausted` without asking, so at most `max_attempts` credentials are ever
//! tried.
//!
//! Probes run with a reduced timeout so a dead server does not stall
//! start-up; the configured timeout is restored on the target handed back on
//! success. A configuration problem ends the bootstrap at once since no
//! credential can fix it. An invalid target is caught in `Init`, before the
//! cache or the user is consulted.

use super::collector::{CollectOutcome, CredentialCollector, CredentialPrompt};
use super::credential_cache::CredentialCache;
use super::diagnostics::ConnectivityProbe;
use crate::constants::{BOOTSTRAP_PROBE_TIMEOUT_SECS, MAX_INTERACTIVE_ATTEMPTS};
use crate::models::{Credentials, DiagnosticReport, DiagnosticTarget, FailureKind, Identity, Stage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROMPT_TITLE: &str = "Directory sign-in";
const RETRY_TITLE: &str = "Sign-in failed";

/// States visited by [`BootstrapAuthenticator::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Init,
    TryCached,
    NeedsInteractive,
    /// 1-based interactive attempt number
    InteractiveAttempt(u32),
    Success,
    Exhausted,
    ConfigurationInvalid,
}

impl BootstrapState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BootstrapState::Success | BootstrapState::Exhausted | BootstrapState::ConfigurationInvalid
        )
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Probe all seven stages instead of stopping after authentication
    pub deep_diagnostics: bool,
    pub max_attempts: u32,
    /// Upper bound on the per-operation timeout while probing
    pub probe_timeout_cap: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            deep_diagnostics: false,
            max_attempts: MAX_INTERACTIVE_ATTEMPTS,
            probe_timeout_cap: Duration::from_secs(BOOTSTRAP_PROBE_TIMEOUT_SECS),
        }
    }
}

/// Terminal result of a bootstrap
#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    Success {
        identity: Identity,
        report: DiagnosticReport,
        /// Target carrying the accepted credential and the configured timeout
        target: DiagnosticTarget,
    },
    /// Attempts ran out or the user cancelled; the host should fall back to a
    /// degraded or settings mode
    Exhausted {
        attempts: u32,
        last_report: Option<DiagnosticReport>,
    },
    ConfigurationInvalid { report: DiagnosticReport },
}

impl BootstrapOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BootstrapOutcome::Success { .. })
    }

    /// The state the bootstrap ended in
    pub fn terminal_state(&self) -> BootstrapState {
        match self {
            BootstrapOutcome::Success { .. } => BootstrapState::Success,
            BootstrapOutcome::Exhausted { .. } => BootstrapState::Exhausted,
            BootstrapOutcome::ConfigurationInvalid { .. } => BootstrapState::ConfigurationInvalid,
        }
    }
}

/// Outcome plus the sequence of states that led to it
#[derive(Debug, Clone)]
pub struct BootstrapRun {
    pub outcome: BootstrapOutcome,
    pub states: Vec<BootstrapState>,
}

pub struct BootstrapAuthenticator {
    probe: Arc<dyn ConnectivityProbe>,
    cache: Arc<CredentialCache>,
    collector: Arc<dyn CredentialCollector>,
    options: BootstrapOptions,
}

/// How a single probe ended
enum Verdict {
    Accepted(DiagnosticReport),
    Rejected(DiagnosticReport),
    Misconfigured(DiagnosticReport),
}

/// Non-terminal states; terminal ones are derived from the outcome
#[derive(Debug, Clone, Copy)]
enum Phase {
    Init,
    TryCached,
    NeedsInteractive,
    InteractiveAttempt(u32),
}

impl From<Phase> for BootstrapState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Init => BootstrapState::Init,
            Phase::TryCached => BootstrapState::TryCached,
            Phase::NeedsInteractive => BootstrapState::NeedsInteractive,
            Phase::InteractiveAttempt(n) => BootstrapState::InteractiveAttempt(n),
        }
    }
}

enum Step {
    Next(Phase),
    Done(BootstrapOutcome),
}

impl BootstrapAuthenticator {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        cache: Arc<CredentialCache>,
        collector: Arc<dyn CredentialCollector>,
    ) -> Self {
        Self {
            probe,
            cache,
            collector,
            options: BootstrapOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BootstrapOptions) -> Self {
        self.options = options;
        self
    }

    fn last_stage(&self) -> Stage {
        if self.options.deep_diagnostics {
            Stage::QuerySucceeded
        } else {
            Stage::Authenticated
        }
    }

    /// Probe `target` with `credentials`
    async fn check(&self, target: &DiagnosticTarget, credentials: Credentials) -> Verdict {
        let candidate = target.clone().with_credentials(Some(credentials));
        let report = self.probe.probe(&candidate, self.last_stage()).await;

        if report.succeeded_through(self.last_stage()) {
            return Verdict::Accepted(report);
        }
        let kind = report.failure().map(|f| f.kind);
        match kind {
            Some(FailureKind::ConfigurationInvalid) => Verdict::Misconfigured(report),
            _ => Verdict::Rejected(report),
        }
    }

    /// Authenticate against `target`, consulting the cache first
    ///
    /// Never fails: every problem ends in a [`BootstrapOutcome`].
    pub async fn run(&self, target: &DiagnosticTarget) -> BootstrapRun {
        let configured_timeout = target.timeout;
        let probe_target = target
            .clone()
            .with_timeout(configured_timeout.min(self.options.probe_timeout_cap));
        let max_attempts = self.options.max_attempts.max(1);

        let mut states = Vec::new();
        let mut phase = Phase::Init;
        let mut candidate: Option<Credentials> = None;
        let mut suggested_identity: Option<String> = None;
        let mut last_report: Option<DiagnosticReport> = None;
        let mut attempts = 0;

        let outcome = loop {
            let state = BootstrapState::from(phase);
            debug!(state = ?state, "Bootstrap transition");
            states.push(state);

            let step = match phase {
                Phase::Init => {
                    info!(
                        host = %target.host(),
                        probe_timeout_ms = probe_target.timeout.as_millis() as u64,
                        "Starting credential bootstrap"
                    );
                    let problems = probe_target.validate();
                    if !problems.is_empty() {
                        warn!(problems = ?problems, "Directory configuration is invalid");
                        let report = self
                            .probe
                            .probe(&probe_target, Stage::ConfigurationValid)
                            .await;
                        Step::Done(BootstrapOutcome::ConfigurationInvalid { report })
                    } else if self.cache.has_credential() {
                        Step::Next(Phase::TryCached)
                    } else {
                        Step::Next(Phase::NeedsInteractive)
                    }
                }

                Phase::TryCached => match self.cache.get() {
                    None => Step::Next(Phase::NeedsInteractive),
                    Some(cached) => {
                        let identity = cached.identity().clone();
                        match self.check(&probe_target, cached).await {
                            Verdict::Accepted(report) => {
                                info!(identity = %identity, "Cached credential accepted");
                                Step::Done(self.success(identity, report, target))
                            }
                            Verdict::Misconfigured(report) => {
                                Step::Done(BootstrapOutcome::ConfigurationInvalid { report })
                            }
                            Verdict::Rejected(report) => {
                                warn!(
                                    identity = %identity,
                                    failure = ?report.failure().map(|f| f.kind),
                                    "Cached credential rejected; clearing it"
                                );
                                self.cache.clear();
                                suggested_identity = Some(identity.to_string());
                                last_report = Some(report);
                                Step::Next(Phase::NeedsInteractive)
                            }
                        }
                    }
                },

                Phase::NeedsInteractive => {
                    let prompt = CredentialPrompt {
                        title: PROMPT_TITLE.to_string(),
                        message: prompt_message(target, last_report.as_ref()),
                        suggested_identity: suggested_identity.clone(),
                        attempt: attempts + 1,
                        max_attempts,
                    };
                    match self.collector.collect(&prompt).await {
                        CollectOutcome::Provided(credentials) => {
                            candidate = Some(credentials);
                            Step::Next(Phase::InteractiveAttempt(attempts + 1))
                        }
                        CollectOutcome::Cancelled => {
                            info!("Credential entry cancelled");
                            exhausted(attempts, last_report.take())
                        }
                    }
                }

                Phase::InteractiveAttempt(n) => {
                    attempts = n;
                    match candidate.take() {
                        None => Step::Next(Phase::NeedsInteractive),
                        Some(credentials) => {
                            let identity = credentials.identity().clone();

                            // Held in memory only until the probe confirms it
                            self.cache.set(credentials.clone());

                            match self.check(&probe_target, credentials).await {
                                Verdict::Accepted(report) => {
                                    info!(identity = %identity, attempt = n, "Credential accepted");
                                    Step::Done(self.success(identity, report, target))
                                }
                                Verdict::Misconfigured(report) => {
                                    self.cache.clear();
                                    Step::Done(BootstrapOutcome::ConfigurationInvalid { report })
                                }
                                Verdict::Rejected(report) => {
                                    self.cache.clear();
                                    let detail = failure_detail(&report);
                                    warn!(
                                        identity = %identity,
                                        attempt = n,
                                        max_attempts,
                                        detail = %detail,
                                        "Credential rejected"
                                    );
                                    suggested_identity = Some(identity.to_string());
                                    last_report = Some(report);

                                    if n >= max_attempts {
                                        exhausted(attempts, last_report.take())
                                    } else if self.collector.confirm_retry(RETRY_TITLE, &detail).await
                                    {
                                        Step::Next(Phase::NeedsInteractive)
                                    } else {
                                        info!("Retry declined");
                                        exhausted(attempts, last_report.take())
                                    }
                                }
                            }
                        }
                    }
                }
            };

            match step {
                Step::Next(next) => phase = next,
                Step::Done(outcome) => break outcome,
            }
        };

        let terminal = outcome.terminal_state();
        debug!(state = ?terminal, "Bootstrap transition");
        states.push(terminal);

        BootstrapRun { outcome, states }
    }

    fn success(
        &self,
        identity: Identity,
        report: DiagnosticReport,
        target: &DiagnosticTarget,
    ) -> BootstrapOutcome {
        // Operational calls get the configured timeout back
        let target = target.clone().with_credentials(self.cache.get());
        BootstrapOutcome::Success {
            identity,
            report,
            target,
        }
    }
}

fn exhausted(attempts: u32, last_report: Option<DiagnosticReport>) -> Step {
    warn!(attempts, "Credential bootstrap exhausted");
    Step::Done(BootstrapOutcome::Exhausted {
        attempts,
        last_report,
    })
}

fn failure_detail(report: &DiagnosticReport) -> String {
    match report.failure() {
        Some(failure) => format!("{}\n\n{}", failure, failure.remediation()),
        None => "The directory did not accept the connection.".to_string(),
    }
}

fn prompt_message(target: &DiagnosticTarget, last_report: Option<&DiagnosticReport>) -> String {
    let mut message = format!("Enter credentials for {}.", target.host());
    if let Some(failure) = last_report.and_then(|r| r.failure()) {
        message.push_str("\n\n");
        message.push_str(&failure.to_string());
    }
    message
}
