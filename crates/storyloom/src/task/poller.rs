//! Polling driver for external provider tasks.
//!
//! One `drive` call owns one `ExternalTask` from submission to a terminal
//! resolution. The sleep between polls is the only suspension point besides
//! the provider call itself, and the number of polls is hard-bounded by the
//! policy, so a drive never outlives `interval * max_attempts` of wall
//! clock.

use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::error::StageError;
use crate::task::{CancelFlag, ExternalTask, TaskClient, TaskSnapshot};

use crate::artifact::Artifact;

/// Polling schedule for one stage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Deterministic upper bound on the wall-clock time a drive may take.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Terminal resolution of a drive. Returned exactly once per task;
/// a cancelled drive resolves to `Cancelled` and nothing else.
#[derive(Debug, Clone)]
pub enum PollResolution {
    Completed(Artifact),
    Failed(StageError),
    TimedOut { attempts: u32 },
    Cancelled,
}

/// Polls `task` against `client` until a terminal snapshot, the attempt
/// budget, or cancellation.
///
/// `TimedOut` is distinguished from a provider `Failed` so the fallback
/// policy can tell "provider said no" from "provider never answered".
/// A transport error from `poll` is treated as a provider failure; the
/// orchestrator never retries on its own.
pub async fn drive(
    client: &dyn TaskClient,
    mut task: ExternalTask,
    policy: PollPolicy,
    cancel: &CancelFlag,
) -> PollResolution {
    debug!(
        "Driving task {} on {} (interval {:?}, max {} attempts)",
        task.handle.id, task.provider, policy.interval, policy.max_attempts
    );

    while task.attempts < policy.max_attempts {
        if cancel.is_cancelled() {
            debug!("Task {} cancelled before poll", task.handle.id);
            return PollResolution::Cancelled;
        }

        tokio::time::sleep(policy.interval).await;

        if cancel.is_cancelled() {
            debug!("Task {} cancelled during wait", task.handle.id);
            return PollResolution::Cancelled;
        }

        task.attempts += 1;
        task.last_polled_at = Some(Utc::now());

        match client.poll(&task.handle).await {
            Ok(TaskSnapshot::Pending) => {
                debug!(
                    "Task {} still pending (attempt {}/{})",
                    task.handle.id, task.attempts, policy.max_attempts
                );
            }
            Ok(TaskSnapshot::Succeeded(artifact)) => {
                debug!(
                    "Task {} succeeded after {} attempts",
                    task.handle.id, task.attempts
                );
                return PollResolution::Completed(artifact);
            }
            Ok(TaskSnapshot::Failed(error)) => {
                debug!("Task {} failed: {}", task.handle.id, error);
                return PollResolution::Failed(error);
            }
            Err(error) => {
                debug!("Task {} poll errored: {}", task.handle.id, error);
                return PollResolution::Failed(error);
            }
        }
    }

    PollResolution::TimedOut {
        attempts: task.attempts,
    }
}
