use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, StageResult};
use crate::error::{ErrorKind, StageError};

/// Status of a generation job.
///
/// `Completed`, `Failed` and `Cancelled` are terminal; the record becomes
/// immutable once one of them is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    Running { stage: String },
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running { stage } => write!(f, "running:{}", stage),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured error captured on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&StageError> for JobError {
    fn from(error: &StageError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Final outcome of a completed job.
///
/// `simulated` is true if any stage fell back to a placeholder; the affected
/// stages are listed so callers can warn the end user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub artifact: Artifact,
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub simulated_stages: Vec<String>,
}

/// One generation job, the unit tracked by the `JobStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    /// Unique job identifier, immutable after creation.
    pub id: String,
    /// Normalized fingerprint of the originating request.
    pub fingerprint: String,
    /// Current status.
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing while running.
    pub progress_percent: u8,
    /// Human-readable label of the active stage.
    pub current_step: String,
    /// Per-stage outputs, append-only.
    pub stage_results: Vec<StageResult>,
    /// Final result, set on `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Structured error, set only on `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    pub(crate) fn new(fingerprint: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            fingerprint: fingerprint.to_string(),
            status: JobStatus::Pending,
            progress_percent: 0,
            current_step: "Queued".to_string(),
            stage_results: Vec::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Names of stages whose artifact was substituted by the fallback policy.
    pub fn simulated_stages(&self) -> Vec<String> {
        self.stage_results
            .iter()
            .filter(|r| r.artifact.simulated)
            .map(|r| r.stage.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;

    #[test]
    fn test_new_job_is_pending() {
        let job = GenerationJob::new("fp-1");
        assert!(!job.id.is_empty());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress_percent, 0);
        assert!(job.stage_results.is_empty());
        assert!(job.completed_at.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running {
            stage: "idea".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_simulated_stages_lists_only_placeholders() {
        let mut job = GenerationJob::new("fp-1");
        job.stage_results.push(StageResult::new(
            "idea",
            Artifact::real(ArtifactKind::Story, "inline"),
        ));
        job.stage_results.push(StageResult::new(
            "clip-1",
            Artifact::placeholder(ArtifactKind::Clip, "placeholder:clip-1"),
        ));

        assert_eq!(job.simulated_stages(), vec!["clip-1".to_string()]);
    }

    #[test]
    fn test_job_error_from_stage_error() {
        let err = JobError::from(&StageError::QuotaExhausted("no credits".to_string()));
        assert_eq!(err.kind, ErrorKind::QuotaExhausted);
        assert!(err.message.contains("no credits"));
    }
}
