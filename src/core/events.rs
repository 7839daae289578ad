//! Structured events emitted by the diagnostics engine
//!
//! The engine never formats log lines itself; it hands a [`StageEvent`] to a
//! [`DiagnosticsSink`] and leaves formatting and destination to the host.

use crate::models::{FailureKind, Stage};
use tracing::{debug, info, warn};

/// One finished (or skipped) stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEvent {
    pub host: String,
    pub stage: Stage,
    pub succeeded: bool,
    pub failure: Option<FailureKind>,
    /// Raw failure detail, never containing secrets
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

impl StageEvent {
    /// True for a failed stage that stops the pipeline
    pub fn is_hard_failure(&self) -> bool {
        !self.succeeded && !self.stage.is_soft()
    }
}

/// Receiver for stage events
pub trait DiagnosticsSink: Send + Sync {
    fn stage_finished(&self, event: &StageEvent);
}

/// Default sink forwarding events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn stage_finished(&self, event: &StageEvent) {
        let stage = event.stage.label();
        match (event.succeeded, event.failure) {
            (true, _) => debug!(
                host = %event.host,
                stage,
                elapsed_ms = event.elapsed_ms,
                "diagnostics stage passed"
            ),
            (false, kind) if event.stage.is_soft() => info!(
                host = %event.host,
                stage,
                kind = ?kind,
                detail = event.detail.as_deref().unwrap_or(""),
                elapsed_ms = event.elapsed_ms,
                "diagnostics stage failed (continuing)"
            ),
            (false, kind) => warn!(
                host = %event.host,
                stage,
                kind = ?kind,
                detail = event.detail.as_deref().unwrap_or(""),
                elapsed_ms = event.elapsed_ms,
                "diagnostics stage failed"
            ),
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn stage_finished(&self, _event: &StageEvent) {}
}
