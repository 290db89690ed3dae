use tokio::sync::mpsc;

use crate::models::RepositoryResult;

/// Live-feed events emitted by the orchestrator.
///
/// Events arrive in completion order, which is non-deterministic; the final
/// report is the only ordered artifact.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A job left the queue and started running.
    JobStarted {
        slug: String,
    },
    /// A job reached a terminal state (complete or errored).
    JobFinished {
        slug: String,
        dependency_count: usize,
        error: Option<String>,
    },
}

impl ProgressEvent {
    pub fn finished(result: &RepositoryResult) -> Self {
        ProgressEvent::JobFinished {
            slug: result.slug(),
            dependency_count: result.dependencies.len(),
            error: result.error.clone(),
        }
    }
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Channel pair for wiring a progress consumer to a run.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}
