use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::artifact::StageResult;
use crate::cache::ResultCache;
use crate::config::OrchestratorConfig;
use crate::error::StageError;
use crate::job::record::{JobError, JobResult};
use crate::job::store::JobStore;
use crate::pipeline::context::JobContext;
use crate::pipeline::fallback::{self, FallbackDecision};
use crate::pipeline::plan::StagePlan;
use crate::pipeline::stage::{StageExecutor, StageKind, StageOutcome};
use crate::request::GenerationRequest;
use crate::task::poller::{self, PollPolicy, PollResolution};
use crate::task::CancelFlag;

/// Terminal outcome of one stage as seen by the runner.
enum StageResolution {
    Folded(StageKind, StageResult),
    Aborted(StageKind, StageError),
    Cancelled,
}

/// Drives one job through its stage plan and finalizes it in the store.
///
/// The runner is the single writer for its job: executors and pollers report
/// back through return values, never by touching the store themselves. A job
/// reaches exactly one terminal state, after which the runner performs no
/// further writes.
pub struct Orchestrator {
    store: Arc<JobStore>,
    cache: Arc<ResultCache>,
    config: Arc<OrchestratorConfig>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<JobStore>,
        cache: Arc<ResultCache>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub async fn run(&self, job_id: &str, request: GenerationRequest, plan: StagePlan) {
        let span = info_span!("generation", job_id = %job_id);
        self.run_inner(job_id, request, plan).instrument(span).await
    }

    async fn run_inner(&self, job_id: &str, request: GenerationRequest, plan: StagePlan) {
        let (cancel, fingerprint) = match (self.store.cancel_flag(job_id), self.store.get(job_id)) {
            (Ok(cancel), Ok(job)) => (cancel, job.fingerprint),
            _ => {
                warn!("Job {} vanished before the pipeline started", job_id);
                return;
            }
        };

        let total = plan.stage_count().max(1);
        let deadline = self.deadline_for(&plan);
        let started = tokio::time::Instant::now();
        let mut completed = 0usize;
        let mut ctx = JobContext::new(job_id, request);

        info!(
            "Starting pipeline with {} stages, deadline {:?}",
            plan.stage_count(),
            deadline
        );

        for phase in plan.phases() {
            if cancel.is_cancelled() {
                debug!("Job {} cancelled between phases", job_id);
                return;
            }

            // Local stages consume no polling budget and run regardless, so
            // an overdue job can still assemble its substituted inputs.
            let overdue =
                !self.phase_budget(phase).is_zero() && started.elapsed() >= deadline;
            let mut abort: Option<(StageKind, StageError)> = None;
            let mut cancelled = false;
            let mut outcomes: Vec<StageResult> = Vec::with_capacity(phase.len());

            if overdue {
                // The job as a whole ran out of wall clock; the remaining
                // stages resolve as timed out without being executed.
                warn!(
                    "Job {} exceeded its deadline of {:?}, substituting remaining stages",
                    job_id, deadline
                );
                for stage in phase {
                    let kind = stage.kind();
                    match fallback::decide(
                        StageError::TimedOut { attempts: 0 },
                        stage.substitute(&ctx),
                    ) {
                        FallbackDecision::Substitute(artifact) => {
                            outcomes.push(StageResult::new(kind.name(), artifact));
                        }
                        FallbackDecision::Abort(error) => {
                            abort = Some((kind, error));
                            break;
                        }
                    }
                }
                for result in &outcomes {
                    completed += 1;
                    let kind_name = result.stage.clone();
                    if self
                        .store
                        .advance(
                            job_id,
                            &kind_name,
                            progress_for(completed, total),
                            &kind_name,
                            Some(result.clone()),
                        )
                        .is_err()
                    {
                        cancelled = true;
                        break;
                    }
                }
            } else {
                for stage in phase {
                    let kind = stage.kind();
                    if self
                        .store
                        .advance(
                            job_id,
                            &kind.name(),
                            progress_for(completed, total),
                            &kind.label(),
                            None,
                        )
                        .is_err()
                    {
                        // Terminal transition raced us; stop writing.
                        debug!("Job {} is already terminal, stopping", job_id);
                        return;
                    }
                }

                let mut running = FuturesUnordered::new();
                for stage in phase {
                    let kind = stage.kind();
                    running.push(
                        self.run_stage(Arc::clone(stage), &ctx, &cancel)
                            .instrument(info_span!("stage", stage = %kind)),
                    );
                }

                while let Some(resolution) = running.next().await {
                    match resolution {
                        StageResolution::Folded(kind, result) => {
                            completed += 1;
                            if self
                                .store
                                .advance(
                                    job_id,
                                    &kind.name(),
                                    progress_for(completed, total),
                                    &kind.label(),
                                    Some(result.clone()),
                                )
                                .is_err()
                            {
                                cancelled = true;
                            } else {
                                outcomes.push(result);
                            }
                        }
                        StageResolution::Aborted(kind, error) => {
                            if abort.is_none() {
                                warn!("Stage {} aborted the job: {}", kind, error);
                                abort = Some((kind, error));
                            }
                            // Stop sibling pollers; they resolve Cancelled
                            // within one interval.
                            cancel.cancel();
                        }
                        StageResolution::Cancelled => {
                            cancelled = true;
                        }
                    }
                }
            }

            if let Some((kind, error)) = abort {
                let mut job_error = JobError::from(&error);
                job_error.message = format!("stage {}: {}", kind.name(), job_error.message);
                if let Err(err) = self.store.fail(job_id, job_error) {
                    debug!("Job {} already finalized: {}", job_id, err);
                }
                return;
            }
            if cancelled || cancel.is_cancelled() {
                debug!("Job {} cancelled, pipeline stopping", job_id);
                return;
            }

            for result in outcomes {
                ctx.fold(result);
            }
        }

        self.finalize(job_id, &fingerprint, &ctx);
    }

    fn finalize(&self, job_id: &str, fingerprint: &str, ctx: &JobContext) {
        let final_artifact = match ctx.artifact(&StageKind::Assembly.name()) {
            Some(artifact) => artifact.clone(),
            None => {
                let error = JobError::from(&StageError::Internal(
                    "pipeline finished without a final artifact".to_string(),
                ));
                if let Err(err) = self.store.fail(job_id, error) {
                    debug!("Job {} already finalized: {}", job_id, err);
                }
                return;
            }
        };

        let assembly = StageKind::Assembly.name();
        let simulated_stages: Vec<String> = ctx
            .results
            .iter()
            .filter(|r| r.artifact.simulated && r.stage != assembly)
            .map(|r| r.stage.clone())
            .collect();
        let result = JobResult {
            simulated: final_artifact.simulated || !simulated_stages.is_empty(),
            simulated_stages,
            artifact: final_artifact.clone(),
        };
        let simulated = result.simulated;

        match self.store.finish(job_id, result) {
            Ok(_) => {
                if !simulated {
                    self.cache.store(fingerprint, job_id, &final_artifact);
                }
            }
            Err(err) => debug!("Job {} already finalized: {}", job_id, err),
        }
    }

    async fn run_stage(
        &self,
        stage: Arc<dyn StageExecutor>,
        ctx: &JobContext,
        cancel: &CancelFlag,
    ) -> StageResolution {
        let kind = stage.kind();
        let resolved = match stage.execute(ctx).await {
            StageOutcome::Done(artifact) => Ok(artifact),
            StageOutcome::Failed(error) => Err(error),
            StageOutcome::Pending(pending) => {
                let policy = self.policy_for(&kind);
                match poller::drive(pending.client.as_ref(), pending.task, policy, cancel).await {
                    PollResolution::Completed(artifact) => Ok(artifact),
                    PollResolution::Failed(error) => Err(error),
                    PollResolution::TimedOut { attempts } => {
                        Err(StageError::TimedOut { attempts })
                    }
                    PollResolution::Cancelled => return StageResolution::Cancelled,
                }
            }
        };

        match resolved {
            Ok(artifact) => StageResolution::Folded(kind, StageResult::new(kind.name(), artifact)),
            Err(error) => {
                warn!("Stage {} failed: {}", kind, error);
                match fallback::decide(error, stage.substitute(ctx)) {
                    FallbackDecision::Substitute(artifact) => {
                        info!("Substituting placeholder artifact for stage {}", kind);
                        StageResolution::Folded(kind, StageResult::new(kind.name(), artifact))
                    }
                    FallbackDecision::Abort(error) => StageResolution::Aborted(kind, error),
                }
            }
        }
    }

    fn policy_for(&self, kind: &StageKind) -> PollPolicy {
        match kind {
            StageKind::Idea | StageKind::Scenes | StageKind::Assembly => {
                self.config.poll.script.policy()
            }
            StageKind::Clip(_) => self.config.poll.clip.policy(),
            StageKind::Audio => self.config.poll.audio.policy(),
        }
    }

    /// Polling budget of one phase: parallel stages share wall clock, so the
    /// phase is budgeted at its slowest stage. Local stages cost nothing.
    fn phase_budget(&self, phase: &[Arc<dyn StageExecutor>]) -> Duration {
        phase
            .iter()
            .map(|stage| match stage.kind() {
                StageKind::Assembly => Duration::ZERO,
                kind => self.policy_for(&kind).budget(),
            })
            .max()
            .unwrap_or_default()
    }

    /// Overall wall-clock deadline: the summed polling budgets of the plan's
    /// phases plus the configured compute slack.
    fn deadline_for(&self, plan: &StagePlan) -> Duration {
        let mut deadline = Duration::from_secs(self.config.compute_slack_secs);
        for phase in plan.phases() {
            deadline += self.phase_budget(phase);
        }
        deadline
    }
}

fn progress_for(completed: usize, total: usize) -> u8 {
    ((completed * 100) / total).min(99) as u8
}
