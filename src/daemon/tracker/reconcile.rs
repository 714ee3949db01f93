//! The return-from-idle decision seam. Closing an idle period suspends the
//! tracker's transition (not the process) until a three-way choice comes
//! back; every resolver must terminate with a deterministic answer.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::storage::activity::Activity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleResolution {
    /// Keep the idle record, relabeled as a break.
    LogAsBreak,
    /// Drop the idle record and extend the last real activity over the gap.
    KeepPreviousActivity,
    /// Drop the idle record entirely.
    DiscardIdle,
}

#[async_trait]
pub trait IdleResolver: Send {
    async fn resolve(&mut self, idle: &Activity) -> IdleResolution;
}

/// Headless default: idle periods become breaks. Chosen over discarding so
/// unattended runs never lose recorded time.
pub struct AutoBreakResolver;

#[async_trait]
impl IdleResolver for AutoBreakResolver {
    async fn resolve(&mut self, _idle: &Activity) -> IdleResolution {
        IdleResolution::LogAsBreak
    }
}

/// A pending decision handed to a UI front end.
#[derive(Debug)]
pub struct IdleDecisionRequest {
    pub idle: Activity,
    pub reply: oneshot::Sender<IdleResolution>,
}

/// Forwards decisions to whoever holds the request receiver. When the UI
/// side is gone or drops a reply (including process exit with a decision
/// pending), falls back to [AutoBreakResolver]'s answer so the tracker can
/// never hang.
pub struct ChannelResolver {
    requests: mpsc::Sender<IdleDecisionRequest>,
}

impl ChannelResolver {
    pub fn new(requests: mpsc::Sender<IdleDecisionRequest>) -> Self {
        Self { requests }
    }

    pub fn channel() -> (Self, mpsc::Receiver<IdleDecisionRequest>) {
        // One pending decision at a time: the tracker blocks on the reply.
        let (sender, receiver) = mpsc::channel(1);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl IdleResolver for ChannelResolver {
    async fn resolve(&mut self, idle: &Activity) -> IdleResolution {
        let (reply, response) = oneshot::channel();
        let request = IdleDecisionRequest {
            idle: idle.clone(),
            reply,
        };
        if self.requests.send(request).await.is_err() {
            warn!("Idle decision channel is closed, logging the idle period as a break");
            return IdleResolution::LogAsBreak;
        }
        match response.await {
            Ok(resolution) => resolution,
            Err(_) => {
                warn!("Idle decision reply was dropped, logging the idle period as a break");
                IdleResolution::LogAsBreak
            }
        }
    }
}
