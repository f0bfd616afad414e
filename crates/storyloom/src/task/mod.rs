//! External asynchronous task plumbing.
//!
//! A `TaskClient` wraps one third-party generation provider behind a
//! `submit`/`poll` capability. The orchestrator never sees provider wire
//! formats, only `SubmitOutcome` and `TaskSnapshot`.

pub mod poller;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::artifact::Artifact;
use crate::error::StageError;
use crate::request::GenerationRequest;

pub use poller::{drive, PollPolicy, PollResolution};

/// Cooperative cancellation flag shared between a job's owner and all of its
/// polling loops. Checked at the top of every poll iteration; never
/// interrupts a provider call already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Provider-assigned identifier for a submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: String,
}

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Result of submitting work to a provider. Providers that finish inline
/// return `Done` directly; task-based providers return `Queued`.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Queued(TaskHandle),
    Done(Artifact),
    Failed(StageError),
}

/// One observation of a provider-side task.
#[derive(Debug, Clone)]
pub enum TaskSnapshot {
    Pending,
    Succeeded(Artifact),
    Failed(StageError),
}

/// Input handed to a provider for one stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub stage: String,
    pub prompt: String,
    pub request: GenerationRequest,
}

/// Capability wrapping one asynchronous generation provider.
///
/// Transport-level retries belong to implementations of this trait; the
/// orchestrator never retries a call on its own.
#[async_trait]
pub trait TaskClient: Send + Sync {
    fn provider(&self) -> &str;

    async fn submit(&self, input: &StageInput) -> Result<SubmitOutcome, StageError>;

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot, StageError>;
}

/// An in-flight provider task, owned by its polling loop until terminal.
#[derive(Debug, Clone)]
pub struct ExternalTask {
    pub provider: String,
    pub handle: TaskHandle,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl ExternalTask {
    pub fn new(provider: impl Into<String>, handle: TaskHandle) -> Self {
        Self {
            provider: provider.into(),
            handle,
            attempts: 0,
            submitted_at: Utc::now(),
            last_polled_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_starts_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_external_task_starts_unpolled() {
        let task = ExternalTask::new("videogen", TaskHandle::new("t-1"));
        assert_eq!(task.attempts, 0);
        assert!(task.last_polled_at.is_none());
        assert_eq!(task.provider, "videogen");
    }
}
