//! Interactive credential collection
//!
//! The bootstrap never talks to a UI toolkit directly. It asks a
//! [`CredentialCollector`] for credentials and for consent to retry; the
//! host decides how to present those requests. [`ChannelCollector`] turns the
//! requests into messages so a UI running elsewhere can answer them.

use crate::models::Credentials;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// What the collector is being asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPrompt {
    pub title: String,
    pub message: String,
    /// Identity to pre-fill, typically the last one tried
    pub suggested_identity: Option<String>,
    /// 1-based attempt number
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Answer to a credential prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    Provided(Credentials),
    Cancelled,
}

/// External collaborator that gathers credentials from a person
#[async_trait]
pub trait CredentialCollector: Send + Sync {
    /// Ask for a credential; waits without timeout
    async fn collect(&self, prompt: &CredentialPrompt) -> CollectOutcome;

    /// Ask whether to try again after a failed attempt
    async fn confirm_retry(&self, title: &str, detail: &str) -> bool;
}

/// Request delivered to the UI side of a [`ChannelCollector`]
#[derive(Debug)]
pub enum CollectorRequest {
    Credentials {
        prompt: CredentialPrompt,
        reply: oneshot::Sender<CollectOutcome>,
    },
    ConfirmRetry {
        title: String,
        detail: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Collector that forwards every request over an mpsc channel
///
/// A closed channel or a dropped reply sender counts as cancellation.
#[derive(Clone)]
pub struct ChannelCollector {
    requests: mpsc::Sender<CollectorRequest>,
}

impl ChannelCollector {
    /// Create the collector and the receiver the UI side should drain
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<CollectorRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { requests: tx }, rx)
    }
}

#[async_trait]
impl CredentialCollector for ChannelCollector {
    async fn collect(&self, prompt: &CredentialPrompt) -> CollectOutcome {
        let (reply, answer) = oneshot::channel();
        let request = CollectorRequest::Credentials {
            prompt: prompt.clone(),
            reply,
        };

        if self.requests.send(request).await.is_err() {
            debug!("Credential collector channel closed; treating as cancellation");
            return CollectOutcome::Cancelled;
        }
        answer.await.unwrap_or(CollectOutcome::Cancelled)
    }

    async fn confirm_retry(&self, title: &str, detail: &str) -> bool {
        let (reply, answer) = oneshot::channel();
        let request = CollectorRequest::ConfirmRetry {
            title: title.to_string(),
            detail: detail.to_string(),
            reply,
        };

        if self.requests.send(request).await.is_err() {
            return false;
        }
        answer.await.unwrap_or(false)
    }
}
