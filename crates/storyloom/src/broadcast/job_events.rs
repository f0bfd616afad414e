//! Job progress broadcaster for real-time status streaming.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::job::record::{GenerationJob, JobError, JobStatus};

/// Default channel capacity; slow subscribers lag rather than block writers.
const DEFAULT_CAPACITY: usize = 256;

/// Snapshot of a job mutation, emitted on every store write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub current_step: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl JobEvent {
    pub fn from_job(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status.clone(),
            progress_percent: job.progress_percent,
            current_step: job.current_step.clone(),
            timestamp: Utc::now(),
            error: job.error.clone(),
        }
    }
}

/// Fan-out channel for `JobEvent`s.
pub struct JobEventBroadcaster {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Sends an event to all subscribers. Send errors mean no subscriber is
    /// currently listening, which is fine.
    pub fn emit(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
