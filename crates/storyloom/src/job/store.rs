//! In-memory job state store with single-writer-per-job discipline.
//!
//! The store is the only structure mutated by more than one logical task;
//! every mutation happens under one `RwLock` write guard and is immediately
//! visible to concurrent status readers. Each mutation also emits a
//! `JobEvent` on the broadcast channel.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::artifact::StageResult;
use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::error::StoreError;
use crate::job::record::{GenerationJob, JobError, JobResult, JobStatus};
use crate::task::CancelFlag;

/// Progress is clamped below 100 until `finish` forces it there.
const MAX_RUNNING_PROGRESS: u8 = 99;

struct JobEntry {
    record: GenerationJob,
    cancel: CancelFlag,
}

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<String, JobEntry>,
    /// fingerprint -> id of the active (non-terminal) job holding it.
    active: HashMap<String, String>,
}

/// Counts of jobs by status, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub struct JobStore {
    inner: RwLock<StoreInner>,
    events: JobEventBroadcaster,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            events: JobEventBroadcaster::default(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Creates a job for `fingerprint`.
    ///
    /// Fails with `DuplicateFingerprint` (carrying the existing job's id) if
    /// an active job already holds the fingerprint, so concurrent submitters
    /// of the same request converge on one job.
    pub fn create(&self, fingerprint: &str) -> Result<GenerationJob, StoreError> {
        let mut inner = self.write();

        if let Some(existing) = inner.active.get(fingerprint) {
            // The active index is cleared on every terminal transition, but
            // verify against the record before rejecting.
            let still_active = inner
                .jobs
                .get(existing)
                .map(|e| !e.record.is_terminal())
                .unwrap_or(false);
            if still_active {
                return Err(StoreError::DuplicateFingerprint {
                    existing: existing.clone(),
                });
            }
        }

        let record = GenerationJob::new(fingerprint);
        let id = record.id.clone();
        inner.active.insert(fingerprint.to_string(), id.clone());
        inner.jobs.insert(
            id,
            JobEntry {
                record: record.clone(),
                cancel: CancelFlag::new(),
            },
        );

        log::debug!("Created job {} for fingerprint {}", record.id, fingerprint);
        self.events.emit(JobEvent::from_job(&record));
        Ok(record)
    }

    /// Returns a snapshot of a job.
    pub fn get(&self, id: &str) -> Result<GenerationJob, StoreError> {
        self.read()
            .jobs
            .get(id)
            .map(|e| e.record.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Returns the cancellation flag shared with the job's polling loops.
    pub fn cancel_flag(&self, id: &str) -> Result<CancelFlag, StoreError> {
        self.read()
            .jobs
            .get(id)
            .map(|e| e.cancel.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Atomically records stage progress.
    ///
    /// Rejects terminal jobs with `InvalidTransition`. Progress is clamped
    /// to stay monotonically non-decreasing and below 100 while running.
    pub fn advance(
        &self,
        id: &str,
        stage: &str,
        progress_percent: u8,
        step_label: &str,
        partial_result: Option<StageResult>,
    ) -> Result<GenerationJob, StoreError> {
        let mut inner = self.write();
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.record.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                status: entry.record.status.to_string(),
            });
        }

        entry.record.status = JobStatus::Running {
            stage: stage.to_string(),
        };
        entry.record.progress_percent = entry
            .record
            .progress_percent
            .max(progress_percent.min(MAX_RUNNING_PROGRESS));
        entry.record.current_step = step_label.to_string();
        if let Some(result) = partial_result {
            entry.record.stage_results.push(result);
        }

        let snapshot = entry.record.clone();
        self.events.emit(JobEvent::from_job(&snapshot));
        Ok(snapshot)
    }

    /// Transitions a job to `Completed` exactly once.
    ///
    /// Repeating the call with the same final artifact is a no-op;
    /// a conflicting repeat fails with `AlreadyTerminal`.
    pub fn finish(&self, id: &str, result: JobResult) -> Result<GenerationJob, StoreError> {
        let mut inner = self.write();
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.record.is_terminal() {
            let same_outcome = entry.record.status == JobStatus::Completed
                && entry
                    .record
                    .result
                    .as_ref()
                    .map(|r| r.artifact.reference == result.artifact.reference)
                    .unwrap_or(false);
            if same_outcome {
                return Ok(entry.record.clone());
            }
            return Err(StoreError::AlreadyTerminal {
                id: id.to_string(),
                status: entry.record.status.to_string(),
            });
        }

        entry.record.status = JobStatus::Completed;
        entry.record.progress_percent = 100;
        entry.record.current_step = "Completed".to_string();
        entry.record.result = Some(result);
        entry.record.completed_at = Some(Utc::now());

        let snapshot = entry.record.clone();
        let fingerprint = snapshot.fingerprint.clone();
        inner.active.remove(&fingerprint);

        log::info!("Job {} completed", id);
        self.events.emit(JobEvent::from_job(&snapshot));
        Ok(snapshot)
    }

    /// Transitions a job to `Failed` exactly once.
    ///
    /// Repeating the call with the same error kind is a no-op; a conflicting
    /// repeat fails with `AlreadyTerminal`.
    pub fn fail(&self, id: &str, error: JobError) -> Result<GenerationJob, StoreError> {
        let mut inner = self.write();
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.record.is_terminal() {
            let same_outcome = entry.record.status == JobStatus::Failed
                && entry
                    .record
                    .error
                    .as_ref()
                    .map(|e| e.kind == error.kind)
                    .unwrap_or(false);
            if same_outcome {
                return Ok(entry.record.clone());
            }
            return Err(StoreError::AlreadyTerminal {
                id: id.to_string(),
                status: entry.record.status.to_string(),
            });
        }

        log::warn!("Job {} failed: {}", id, error);
        entry.record.status = JobStatus::Failed;
        entry.record.current_step = "Failed".to_string();
        entry.record.error = Some(error);
        entry.record.completed_at = Some(Utc::now());

        let snapshot = entry.record.clone();
        let fingerprint = snapshot.fingerprint.clone();
        inner.active.remove(&fingerprint);

        self.events.emit(JobEvent::from_job(&snapshot));
        Ok(snapshot)
    }

    /// Cancels a job: terminal `Cancelled` status plus a tripped cancel flag
    /// so every polling loop owned by the job stops within one interval.
    /// Cancelling an already-cancelled job is a no-op.
    pub fn cancel(&self, id: &str) -> Result<GenerationJob, StoreError> {
        let mut inner = self.write();
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.record.is_terminal() {
            if entry.record.status == JobStatus::Cancelled {
                return Ok(entry.record.clone());
            }
            return Err(StoreError::AlreadyTerminal {
                id: id.to_string(),
                status: entry.record.status.to_string(),
            });
        }

        entry.cancel.cancel();
        entry.record.status = JobStatus::Cancelled;
        entry.record.current_step = "Cancelled".to_string();
        entry.record.completed_at = Some(Utc::now());

        let snapshot = entry.record.clone();
        let fingerprint = snapshot.fingerprint.clone();
        inner.active.remove(&fingerprint);

        log::info!("Job {} cancelled", id);
        self.events.emit(JobEvent::from_job(&snapshot));
        Ok(snapshot)
    }

    /// Returns counts of jobs by status.
    pub fn counts(&self) -> JobCounts {
        let inner = self.read();
        let mut counts = JobCounts::default();
        for entry in inner.jobs.values() {
            match entry.record.status {
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
                JobStatus::Pending | JobStatus::Running { .. } => counts.active += 1,
            }
        }
        counts
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
