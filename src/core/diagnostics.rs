//! Diagnostics engine
//!
//! Runs the connection pipeline against a [`DiagnosticTarget`]:
//!
//! 1. configuration validation (local, no I/O)
//! 2. name resolution
//! 3. reachability (echo probe, soft: never halts the pipeline)
//! 4. port connectivity
//! 5. protocol handshake with an anonymous bind
//! 6. authentication
//! 7. representative query
//!
//! Stages run strictly in order, each bounded by the target's timeout. The
//! first hard failure stops the run; later stages stay recorded as not
//! attempted. No transport error escapes: every failure is classified into
//! the report.
//!
//! # Example
//!
//! ```ignore
//! use dirprobe::core::DiagnosticsEngine;
//! use dirprobe::platform::LdapTransport;
//!
//! let engine = DiagnosticsEngine::new(Arc::new(LdapTransport::new()));
//! let report = engine.run(&target).await;
//! println!("{}", report.render_text());
//! ```

use super::classify::{classify, ProbeFailure};
use super::events::{DiagnosticsSink, StageEvent, TracingSink};
use super::transport::{DirectorySession, DirectoryTransport};
use crate::constants::PING_WAIT_MS;
use crate::models::{DiagnosticReport, DiagnosticTarget, Stage, StageOutcome};
use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

/// Something that can check a target and report per-stage outcomes
///
/// Implemented by [`DiagnosticsEngine`]; the bootstrap depends on this trait
/// so it can be driven by scripted probes in tests.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Run the pipeline up to and including `last`
    async fn probe(&self, target: &DiagnosticTarget, last: Stage) -> DiagnosticReport;
}

pub struct DiagnosticsEngine {
    transport: Arc<dyn DirectoryTransport>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl DiagnosticsEngine {
    pub fn new(transport: Arc<dyn DirectoryTransport>) -> Self {
        Self {
            transport,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the default tracing sink
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run all seven stages
    pub async fn run(&self, target: &DiagnosticTarget) -> DiagnosticReport {
        self.run_through(target, Stage::QuerySucceeded).await
    }

    /// Run stages in order, stopping after `last` or at the first hard failure
    pub async fn run_through(&self, target: &DiagnosticTarget, last: Stage) -> DiagnosticReport {
        let mut run = Run {
            sink: self.sink.as_ref(),
            report: DiagnosticReport::new(target.host(), target.port, target.use_tls),
        };
        let host = target.host().to_string();
        let bound = target.timeout;

        info!(
            host = %host,
            port = target.port,
            tls = target.use_tls,
            timeout_ms = bound.as_millis() as u64,
            last_stage = last.label(),
            "Starting directory diagnostics"
        );

        // 1. Configuration
        let started = Instant::now();
        let problems = target.validate();
        let config_result = if problems.is_empty() {
            Ok(())
        } else {
            Err(ProbeFailure::new(problems.join("; ")))
        };
        if !run.finish(Stage::ConfigurationValid, started, config_result) || last == Stage::ConfigurationValid {
            return run.report;
        }

        // 2. Name resolution
        let started = Instant::now();
        let resolved = bounded(
            bound,
            "name resolution",
            self.transport.resolve(&host, target.port),
        )
        .await
        .and_then(|addrs| {
            if addrs.is_empty() {
                Err(ProbeFailure::new(format!("no addresses found for {}", host)))
            } else {
                Ok(addrs)
            }
        });
        let addrs = match resolved {
            Ok(addrs) => {
                run.report.resolved_addresses = addrs.iter().map(|a| a.to_string()).collect();
                run.finish(Stage::NameResolved, started, Ok(()));
                addrs
            }
            Err(failure) => {
                run.finish(Stage::NameResolved, started, Err(failure));
                return run.report;
            }
        };
        if last == Stage::NameResolved {
            return run.report;
        }

        // 3. Reachability (soft)
        let started = Instant::now();
        let wait = bound.min(Duration::from_millis(PING_WAIT_MS));
        let ping = bounded(bound, "echo probe", self.transport.ping(addrs[0], wait)).await;
        run.finish(Stage::NetworkReachable, started, ping);
        if last == Stage::NetworkReachable {
            return run.report;
        }

        // 4. Port connectivity
        let started = Instant::now();
        let sockets: Vec<SocketAddr> = addrs
            .iter()
            .map(|addr| SocketAddr::new(*addr, target.port))
            .collect();
        let connect = bounded(bound, "connect", self.transport.connect(&sockets)).await;
        if !run.finish(Stage::PortOpen, started, connect) || last == Stage::PortOpen {
            return run.report;
        }

        // 5. Protocol handshake
        let started = Instant::now();
        let mut session =
            match bounded(bound, "protocol handshake", self.transport.open_session(target)).await {
                Ok(session) => {
                    run.finish(Stage::ProtocolConnected, started, Ok(()));
                    session
                }
                Err(failure) => {
                    run.finish(Stage::ProtocolConnected, started, Err(failure));
                    return run.report;
                }
            };

        if last > Stage::ProtocolConnected {
            self.run_session_stages(&mut run, session.as_mut(), target, last)
                .await;
        }

        // Best effort: a hung unbind must not stall the caller
        let _ = timeout(bound, session.close()).await;
        run.report
    }

    async fn run_session_stages(
        &self,
        run: &mut Run<'_>,
        session: &mut dyn DirectorySession,
        target: &DiagnosticTarget,
        last: Stage,
    ) {
        let bound = target.timeout;

        // 6. Authentication
        let started = Instant::now();
        let bind = bounded(
            bound,
            "bind",
            session.bind(target.credentials.as_ref(), &target.domain),
        )
        .await;
        if !run.finish(Stage::Authenticated, started, bind) || last == Stage::Authenticated {
            return;
        }

        // 7. Representative query
        let started = Instant::now();
        let base = target.search_base();
        let limit = crate::constants::QUERY_SAMPLE_LIMIT;
        match bounded(bound, "query", session.sample(base.as_deref(), limit)).await {
            Ok(sample) => {
                debug!(
                    naming_context = sample.naming_context.as_deref().unwrap_or(""),
                    entries = sample.entries,
                    "Representative query returned"
                );
                run.report.naming_context = sample.naming_context;
                run.report.sampled_entries = Some(sample.entries);
                run.finish(Stage::QuerySucceeded, started, Ok(()));
            }
            Err(failure) => {
                run.finish(Stage::QuerySucceeded, started, Err(failure));
            }
        }
    }
}

#[async_trait]
impl ConnectivityProbe for DiagnosticsEngine {
    async fn probe(&self, target: &DiagnosticTarget, last: Stage) -> DiagnosticReport {
        self.run_through(target, last).await
    }
}

/// Report under construction plus the sink to notify
struct Run<'a> {
    sink: &'a dyn DiagnosticsSink,
    report: DiagnosticReport,
}

impl Run<'_> {
    /// Record a stage outcome and emit its event
    ///
    /// Returns true when the pipeline may continue: the stage passed, or it
    /// failed softly.
    fn finish(&mut self, stage: Stage, started: Instant, result: Result<(), ProbeFailure>) -> bool {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok(()) => StageOutcome::passed(stage, elapsed_ms),
            Err(failure) => StageOutcome::failed(stage, elapsed_ms, classify(stage, &failure)),
        };

        self.sink.stage_finished(&StageEvent {
            host: self.report.host.clone(),
            stage,
            succeeded: outcome.succeeded,
            failure: outcome.failure.as_ref().map(|f| f.kind),
            detail: outcome.failure.as_ref().map(|f| f.detail.clone()),
            elapsed_ms,
        });

        let proceed = outcome.succeeded || stage.is_soft();
        self.report.record(outcome);
        proceed
    }
}

/// Race `operation` against `limit`; losing the race is a failure
async fn bounded<T, F>(limit: Duration, label: &str, operation: F) -> Result<T, ProbeFailure>
where
    F: Future<Output = Result<T, ProbeFailure>>,
{
    match timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(ProbeFailure::timed_out(label, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{NullSink, StageEvent};
    use crate::core::mock_transport::{MockBehavior, MockTransport};
    use crate::models::{Credentials, FailureKind};
    use std::sync::Mutex;

    fn target() -> DiagnosticTarget {
        DiagnosticTarget::new("corp.local", 389)
            .with_timeout(Duration::from_millis(200))
            .with_credentials(Some(Credentials::from_parts("alice", "pw").unwrap()))
    }

    fn engine(transport: Arc<MockTransport>) -> DiagnosticsEngine {
        DiagnosticsEngine::new(transport).with_sink(Arc::new(NullSink))
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<StageEvent>>,
    }

    impl DiagnosticsSink for RecordingSink {
        fn stage_finished(&self, event: &StageEvent) {
            self.events
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(event.clone());
        }
    }

    #[tokio::test]
    async fn all_stages_pass_against_healthy_server() {
        let transport = Arc::new(MockTransport::healthy());
        let report = engine(transport.clone()).run(&target()).await;

        assert!(report.fully_operational());
        assert!(Stage::ALL.iter().all(|s| report.outcome(*s)));
        assert_eq!(report.resolved_addresses, vec!["10.0.0.10".to_string()]);
        assert_eq!(report.sampled_entries, Some(3));
        assert_eq!(report.naming_context.as_deref(), Some("DC=corp,DC=local"));
        assert_eq!(transport.calls().sample, 1);
        assert_eq!(transport.calls().close, 1);
    }

    #[tokio::test]
    async fn configuration_failure_skips_all_network_stages() {
        let transport = Arc::new(MockTransport::healthy());
        let bad = DiagnosticTarget::new("", 0);
        let report = engine(transport.clone()).run(&bad).await;

        assert!(!report.outcome(Stage::ConfigurationValid));
        assert_eq!(
            report.failure().map(|f| f.kind),
            Some(FailureKind::ConfigurationInvalid)
        );
        assert!(report.stages[1..].iter().all(|s| !s.attempted));
        assert_eq!(transport.calls().total(), 0);
    }

    #[tokio::test]
    async fn each_hard_failure_stops_later_stages() {
        let cases = [
            (Stage::NameResolved, MockTransport::healthy().resolve(MockBehavior::Fail("no such host"))),
            (Stage::PortOpen, MockTransport::healthy().connect(MockBehavior::Fail("connection refused"))),
            (Stage::ProtocolConnected, MockTransport::healthy().open(MockBehavior::Fail("server unavailable"))),
            (Stage::Authenticated, MockTransport::healthy().bind(MockBehavior::FailCode(49, "invalid credentials"))),
            (Stage::QuerySucceeded, MockTransport::healthy().sample(MockBehavior::FailCode(50, "insufficient access"))),
        ];

        for (failing, transport) in cases {
            let transport = Arc::new(transport);
            let report = engine(transport.clone()).run(&target()).await;

            for stage in Stage::ALL {
                let outcome = report.stage(stage);
                if stage < failing {
                    assert!(outcome.succeeded, "{:?} should pass when {:?} fails", stage, failing);
                } else if stage == failing {
                    assert!(outcome.attempted && !outcome.succeeded);
                } else {
                    assert!(!outcome.attempted && !outcome.succeeded, "{:?} ran after {:?}", stage, failing);
                }
            }

            let calls = transport.calls();
            let invoked = [
                (Stage::NameResolved, calls.resolve),
                (Stage::NetworkReachable, calls.ping),
                (Stage::PortOpen, calls.connect),
                (Stage::ProtocolConnected, calls.open),
                (Stage::Authenticated, calls.bind),
                (Stage::QuerySucceeded, calls.sample),
            ];
            for (stage, count) in invoked {
                let expected = if stage <= failing { 1 } else { 0 };
                assert_eq!(count, expected, "{:?} call count when {:?} fails", stage, failing);
            }
            assert!(!report.fully_operational());
        }
    }

    #[tokio::test]
    async fn failed_ping_does_not_stop_pipeline() {
        let transport =
            Arc::new(MockTransport::healthy().ping(MockBehavior::Fail("100% packet loss")));
        let report = engine(transport.clone()).run(&target()).await;

        assert!(!report.outcome(Stage::NetworkReachable));
        for stage in [Stage::PortOpen, Stage::ProtocolConnected, Stage::Authenticated, Stage::QuerySucceeded] {
            assert!(report.outcome(stage));
        }
        assert!(!report.fully_operational());
        assert!(report.succeeded_through(Stage::QuerySucceeded));
        assert!(report.failure().is_none());
        assert_eq!(report.warnings()[0].kind, FailureKind::HostUnreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_is_port_unreachable() {
        let transport = Arc::new(
            MockTransport::healthy()
                .ping(MockBehavior::Fail("request timed out"))
                .connect(MockBehavior::Hang),
        );
        let report = engine(transport.clone()).run(&target()).await;

        assert!(report.outcome(Stage::ConfigurationValid));
        assert!(report.outcome(Stage::NameResolved));
        assert!(!report.outcome(Stage::PortOpen));
        assert!(!report.outcome(Stage::ProtocolConnected));
        assert!(!report.outcome(Stage::Authenticated));
        assert!(!report.outcome(Stage::QuerySucceeded));
        assert!(!report.fully_operational());
        assert_eq!(
            report.failure().map(|f| f.kind),
            Some(FailureKind::PortUnreachable)
        );
        assert_eq!(transport.calls().open, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_hang_is_timeout() {
        let transport = Arc::new(MockTransport::healthy().open(MockBehavior::Hang));
        let started = tokio::time::Instant::now();
        let report = engine(transport.clone()).run(&target()).await;

        assert!(report.outcome(Stage::PortOpen));
        assert!(!report.outcome(Stage::ProtocolConnected));
        assert_eq!(report.failure().map(|f| f.kind), Some(FailureKind::Timeout));
        assert_eq!(transport.calls().bind, 0);
        // The stage timer fired on the paused clock, not after a real wait
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn bind_hang_is_timeout_and_skips_query() {
        let transport = Arc::new(MockTransport::healthy().bind(MockBehavior::Hang));
        let report = engine(transport.clone()).run(&target()).await;

        assert!(report.outcome(Stage::ProtocolConnected));
        assert!(!report.outcome(Stage::Authenticated));
        assert!(!report.outcome(Stage::QuerySucceeded));
        assert_eq!(report.failure().map(|f| f.kind), Some(FailureKind::Timeout));
        assert_eq!(transport.calls().sample, 0);
    }

    #[tokio::test]
    async fn empty_resolution_is_hard_failure() {
        let transport = Arc::new(MockTransport::healthy().resolve(MockBehavior::Empty));
        let report = engine(transport.clone()).run(&target()).await;

        assert_eq!(
            report.failure().map(|f| f.kind),
            Some(FailureKind::NameResolutionFailed)
        );
        assert_eq!(transport.calls().ping, 0);
    }

    #[tokio::test]
    async fn account_lockout_is_classified() {
        let transport = Arc::new(MockTransport::healthy().bind(MockBehavior::FailCode(
            49,
            "80090308: LdapErr: DSID-0C09042A, comment: AcceptSecurityContext error, data 775, v3839",
        )));
        let report = engine(transport.clone()).run(&target()).await;

        assert_eq!(
            report.failure().map(|f| f.kind),
            Some(FailureKind::AccountLockedOrExpired)
        );
        assert_eq!(transport.calls().close, 1);
    }

    #[tokio::test]
    async fn run_through_authentication_skips_query() {
        let transport = Arc::new(MockTransport::healthy());
        let report = engine(transport.clone())
            .run_through(&target(), Stage::Authenticated)
            .await;

        assert!(report.succeeded_through(Stage::Authenticated));
        assert!(!report.stage(Stage::QuerySucceeded).attempted);
        assert!(!report.fully_operational());
        assert_eq!(transport.calls().sample, 0);
    }

    #[tokio::test]
    async fn sink_receives_one_event_per_attempted_stage() {
        let transport = Arc::new(MockTransport::healthy().bind(MockBehavior::FailCode(49, "")));
        let sink = Arc::new(RecordingSink::default());
        let report = DiagnosticsEngine::new(transport)
            .with_sink(sink.clone())
            .run(&target())
            .await;

        let events = sink.events.lock().unwrap();
        let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
        assert_eq!(stages, Stage::ALL[..6].to_vec());
        assert!(events[5].is_hard_failure());
        assert_eq!(events[5].failure, Some(FailureKind::InvalidCredentials));
        assert!(!report.fully_operational());
    }
}
