//! Public facade over the job store, result cache and pipeline runner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::artifact::Artifact;
use crate::broadcast::JobEvent;
use crate::cache::ResultCache;
use crate::config::OrchestratorConfig;
use crate::error::{Result, ResultError, StoreError, SubmitError};
use crate::fingerprint::fingerprint;
use crate::job::record::{JobError, JobStatus};
use crate::job::store::{JobCounts, JobStore};
use crate::pipeline::plan::StagePlanner;
use crate::pipeline::runner::Orchestrator;
use crate::request::GenerationRequest;

/// Outcome of a submission.
///
/// `cached` is true when a previously completed result was served without
/// creating a new job; a deduplicated submission against an active job
/// returns that job's id with `cached` false.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: String,
    pub cached: bool,
}

/// Non-blocking job snapshot for status polling.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub current_step: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

/// Final result of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultView {
    pub job_id: String,
    pub artifact: Artifact,
    pub simulated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub simulated_stages: Vec<String>,
}

/// Entry point for embedders: submit, observe and cancel generation jobs.
///
/// Must be used from within a tokio runtime; `submit_job` spawns the
/// pipeline task for each accepted request.
pub struct GenerationService {
    store: Arc<JobStore>,
    cache: Arc<ResultCache>,
    planner: Arc<dyn StagePlanner>,
    orchestrator: Arc<Orchestrator>,
}

impl GenerationService {
    pub fn new(planner: Arc<dyn StagePlanner>, config: OrchestratorConfig) -> Self {
        let store = Arc::new(JobStore::new());
        let cache = Arc::new(ResultCache::new(&config.cache));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::new(config),
        ));

        Self {
            store,
            cache,
            planner,
            orchestrator,
        }
    }

    /// Validates and submits a request.
    ///
    /// A fingerprint match against a live cached result short-circuits
    /// without creating a job; a match against an active job returns that
    /// job's id. Otherwise a new job is created and its pipeline spawned.
    pub fn submit_job(&self, request: GenerationRequest) -> Result<SubmitReceipt> {
        request.validate().map_err(SubmitError::from)?;
        let fingerprint = fingerprint(&request);

        if let Some(entry) = self.cache.lookup(&fingerprint) {
            info!(
                "Serving cached result of job {} for fingerprint {}",
                entry.job_id, fingerprint
            );
            return Ok(SubmitReceipt {
                job_id: entry.job_id,
                cached: true,
            });
        }

        let job = match self.store.create(&fingerprint) {
            Ok(job) => job,
            Err(StoreError::DuplicateFingerprint { existing }) => {
                info!(
                    "Deduplicated submission onto active job {} for fingerprint {}",
                    existing, fingerprint
                );
                return Ok(SubmitReceipt {
                    job_id: existing,
                    cached: false,
                });
            }
            Err(err) => return Err(SubmitError::from(err).into()),
        };

        let plan = self.planner.plan(&request);
        let orchestrator = Arc::clone(&self.orchestrator);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            orchestrator.run(&job_id, request, plan).await;
        });

        Ok(SubmitReceipt {
            job_id: job.id,
            cached: false,
        })
    }

    /// Current snapshot of a job. Never blocks on the pipeline.
    pub fn get_status(&self, job_id: &str) -> Result<JobStatusView> {
        let job = self.store.get(job_id)?;
        Ok(JobStatusView {
            job_id: job.id,
            status: job.status,
            progress_percent: job.progress_percent,
            current_step: job.current_step,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error: job.error,
        })
    }

    /// Final result of a job, available once it has completed.
    pub fn get_result(&self, job_id: &str) -> Result<JobResultView> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ResultError::NotFound(job_id.to_string()))?;

        match job.status {
            JobStatus::Completed => {
                let result = job.result.ok_or_else(|| {
                    // A completed job always carries its result; treat a
                    // missing one as not ready rather than panicking.
                    ResultError::NotReady(job_id.to_string())
                })?;
                Ok(JobResultView {
                    job_id: job.id,
                    artifact: result.artifact,
                    simulated: result.simulated,
                    simulated_stages: result.simulated_stages,
                })
            }
            JobStatus::Pending | JobStatus::Running { .. } => {
                Err(ResultError::NotReady(job_id.to_string()).into())
            }
            JobStatus::Cancelled => Err(ResultError::Cancelled {
                id: job_id.to_string(),
            }
            .into()),
            JobStatus::Failed => Err(ResultError::Failed {
                id: job_id.to_string(),
                error: job.error.unwrap_or(JobError {
                    kind: crate::error::ErrorKind::Internal,
                    message: "job failed without a recorded error".to_string(),
                }),
            }
            .into()),
        }
    }

    /// Cooperatively cancels a job and all of its polling loops.
    pub fn cancel_job(&self, job_id: &str) -> Result<()> {
        self.store.cancel(job_id)?;
        Ok(())
    }

    /// Real-time stream of job events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobEvent> {
        self.store.subscribe()
    }

    pub fn counts(&self) -> JobCounts {
        self.store.counts()
    }
}
