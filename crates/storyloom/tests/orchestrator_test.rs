//! End-to-end pipeline scenarios through the public service API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storyloom::config::{CacheSettings, PollPolicyConfig, PollSettings};
use storyloom::error::StageError;
use storyloom::job::JobStatus;
use storyloom::pipeline::StandardPlanner;
use storyloom::task::{StageInput, SubmitOutcome, TaskSnapshot};
use storyloom::{
    Artifact, ArtifactKind, GenerationRequest, GenerationService, JobEvent, OrchestratorConfig,
    ResultError, StoryloomError, TaskClient, TaskHandle,
};

/// Provider stub: queues every submission and stays pending for a fixed
/// number of polls per task before succeeding.
struct ScriptedProvider {
    pending_polls: u32,
    poll_counts: Mutex<std::collections::HashMap<String, u32>>,
    submissions: AtomicU32,
}

impl ScriptedProvider {
    fn new(pending_polls: u32) -> Self {
        Self {
            pending_polls,
            poll_counts: Mutex::new(std::collections::HashMap::new()),
            submissions: AtomicU32::new(0),
        }
    }

    fn submission_count(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }

    fn artifact_for(stage: &str) -> Artifact {
        let kind = if stage.starts_with("clip") {
            ArtifactKind::Clip
        } else if stage == "audio" {
            ArtifactKind::AudioTrack
        } else if stage == "scenes" {
            ArtifactKind::SceneScript
        } else {
            ArtifactKind::Story
        };
        Artifact::real(kind, format!("{}.out", stage))
    }
}

#[async_trait]
impl TaskClient for ScriptedProvider {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, input: &StageInput) -> Result<SubmitOutcome, StageError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitOutcome::Queued(TaskHandle::new(format!(
            "t-{}",
            input.stage
        ))))
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot, StageError> {
        let mut counts = self.poll_counts.lock().unwrap();
        let n = counts.entry(handle.id.clone()).or_insert(0);
        *n += 1;
        if *n <= self.pending_polls {
            return Ok(TaskSnapshot::Pending);
        }
        let stage = handle.id.trim_start_matches("t-");
        Ok(TaskSnapshot::Succeeded(Self::artifact_for(stage)))
    }
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        version: "1.0".to_string(),
        poll: PollSettings {
            script: PollPolicyConfig {
                interval_ms: 1000,
                max_attempts: 5,
            },
            clip: PollPolicyConfig {
                interval_ms: 1000,
                max_attempts: 5,
            },
            audio: PollPolicyConfig {
                interval_ms: 1000,
                max_attempts: 5,
            },
        },
        cache: CacheSettings::default(),
        compute_slack_secs: 60,
    }
}

fn service_with(provider: Arc<ScriptedProvider>) -> GenerationService {
    let client: Arc<dyn TaskClient> = provider;
    let planner = Arc::new(StandardPlanner::new(
        Arc::clone(&client),
        Arc::clone(&client),
        Arc::clone(&client),
    ));
    GenerationService::new(planner, config())
}

fn request() -> GenerationRequest {
    GenerationRequest::new("a fox in the snow", "watercolor", "en", 60, 2)
}

async fn wait_terminal(
    rx: &mut tokio::sync::broadcast::Receiver<JobEvent>,
    job_id: &str,
) -> JobEvent {
    loop {
        let event = rx.recv().await.unwrap();
        if event.job_id == job_id && event.status.is_terminal() {
            return event;
        }
    }
}

// Every provider task succeeds on its first poll; the job
// completes with a real result and the fingerprint lands in the cache.
#[tokio::test(start_paused = true)]
async fn first_poll_success_completes_and_populates_cache() {
    let svc = service_with(Arc::new(ScriptedProvider::new(0)));
    let mut rx = svc.subscribe();

    let receipt = svc.submit_job(request()).unwrap();
    assert!(!receipt.cached);

    let last = wait_terminal(&mut rx, &receipt.job_id).await;
    assert_eq!(last.status, JobStatus::Completed);

    let result = svc.get_result(&receipt.job_id).unwrap();
    assert!(!result.simulated);
    assert!(result.simulated_stages.is_empty());
    assert_eq!(result.artifact.kind, ArtifactKind::FinalCut);

    // Cache hit on resubmission, without a new job.
    let resubmit = svc.submit_job(request()).unwrap();
    assert!(resubmit.cached);
    assert_eq!(resubmit.job_id, receipt.job_id);
}

// Resubmitting the same request while its job is still running
// converges on the same job id and creates no second job.
#[tokio::test(start_paused = true)]
async fn duplicate_submission_converges_on_active_job() {
    let provider = Arc::new(ScriptedProvider::new(2));
    let svc = service_with(Arc::clone(&provider));

    let first = svc.submit_job(request()).unwrap();
    let second = svc.submit_job(request()).unwrap();

    assert_eq!(second.job_id, first.job_id);
    assert!(!second.cached);
    assert_eq!(svc.counts().active, 1);

    let mut rx = svc.subscribe();
    let status = svc.get_status(&first.job_id).unwrap();
    if !status.status.is_terminal() {
        wait_terminal(&mut rx, &first.job_id).await;
    }
    // One pipeline ran: 2 text + 2 clip + 1 audio submissions.
    assert_eq!(provider.submission_count(), 5);
}

// Providers never resolve within the 5-attempt budget. Every
// provider stage has a substitute, so the job completes simulated instead
// of failing.
#[tokio::test(start_paused = true)]
async fn exhausted_polling_budget_falls_back_to_simulation() {
    let svc = service_with(Arc::new(ScriptedProvider::new(u32::MAX)));
    let mut rx = svc.subscribe();

    let receipt = svc.submit_job(request()).unwrap();
    let last = wait_terminal(&mut rx, &receipt.job_id).await;
    assert_eq!(last.status, JobStatus::Completed);

    let result = svc.get_result(&receipt.job_id).unwrap();
    assert!(result.simulated);
    // Every provider-backed stage timed out and was substituted.
    assert_eq!(result.simulated_stages.len(), 5);
    assert!(result
        .simulated_stages
        .iter()
        .any(|s| s == "clip-1"));

    // Simulated results are never cached; a resubmission starts fresh.
    let resubmit = svc.submit_job(request()).unwrap();
    assert!(!resubmit.cached);
    assert_ne!(resubmit.job_id, receipt.job_id);
}

// Cancellation mid-poll freezes the job. No progress or stage
// writes are observed afterwards, and the status is the distinguished
// Cancelled state.
#[tokio::test(start_paused = true)]
async fn cancellation_mid_poll_stops_all_writes() {
    let svc = service_with(Arc::new(ScriptedProvider::new(u32::MAX)));

    let receipt = svc.submit_job(request()).unwrap();

    // Let the pipeline reach its first polling loop (attempt ~2 of 5).
    tokio::time::sleep(Duration::from_millis(2500)).await;
    svc.cancel_job(&receipt.job_id).unwrap();

    let status = svc.get_status(&receipt.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Cancelled);
    let frozen_progress = status.progress_percent;
    let frozen_step = status.current_step.clone();

    // Long after every polling budget has lapsed, nothing has changed.
    tokio::time::sleep(Duration::from_secs(120)).await;
    let later = svc.get_status(&receipt.job_id).unwrap();
    assert_eq!(later.status, JobStatus::Cancelled);
    assert_eq!(later.progress_percent, frozen_progress);
    assert_eq!(later.current_step, frozen_step);

    match svc.get_result(&receipt.job_id) {
        Err(StoryloomError::Result(ResultError::Cancelled { id })) => {
            assert_eq!(id, receipt.job_id);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

// A failing provider on a single clip degrades only that clip; the job
// still completes, flagged as simulated, and is kept out of the cache.
#[tokio::test(start_paused = true)]
async fn single_stage_failure_degrades_gracefully() {
    struct FlakyProvider {
        inner: ScriptedProvider,
    }

    #[async_trait]
    impl TaskClient for FlakyProvider {
        fn provider(&self) -> &str {
            "flaky"
        }

        async fn submit(&self, input: &StageInput) -> Result<SubmitOutcome, StageError> {
            if input.stage == "clip-2" {
                return Ok(SubmitOutcome::Failed(StageError::QuotaExhausted(
                    "render quota exhausted".to_string(),
                )));
            }
            self.inner.submit(input).await
        }

        async fn poll(&self, handle: &TaskHandle) -> Result<TaskSnapshot, StageError> {
            self.inner.poll(handle).await
        }
    }

    let client: Arc<dyn TaskClient> = Arc::new(FlakyProvider {
        inner: ScriptedProvider::new(0),
    });
    let planner = Arc::new(StandardPlanner::new(
        Arc::clone(&client),
        Arc::clone(&client),
        Arc::clone(&client),
    ));
    let svc = GenerationService::new(planner, config());
    let mut rx = svc.subscribe();

    let receipt = svc.submit_job(request()).unwrap();
    let last = wait_terminal(&mut rx, &receipt.job_id).await;
    assert_eq!(last.status, JobStatus::Completed);

    let result = svc.get_result(&receipt.job_id).unwrap();
    assert!(result.simulated);
    assert_eq!(result.simulated_stages, vec!["clip-2".to_string()]);

    let resubmit = svc.submit_job(request()).unwrap();
    assert!(!resubmit.cached);
}

// Progress over the full run is monotone and ends at exactly 100.
#[tokio::test(start_paused = true)]
async fn progress_is_monotone_until_completion() {
    let svc = service_with(Arc::new(ScriptedProvider::new(1)));
    let mut rx = svc.subscribe();

    let receipt = svc.submit_job(request()).unwrap();

    let mut last_progress = 0u8;
    loop {
        let event = rx.recv().await.unwrap();
        if event.job_id != receipt.job_id {
            continue;
        }
        assert!(
            event.progress_percent >= last_progress,
            "progress regressed from {} to {}",
            last_progress,
            event.progress_percent
        );
        last_progress = event.progress_percent;
        if event.status.is_terminal() {
            break;
        }
    }
    assert_eq!(last_progress, 100);
}
