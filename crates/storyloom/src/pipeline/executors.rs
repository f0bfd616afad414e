//! Concrete stage executors and the standard five-stage plan.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::artifact::Artifact;
use crate::error::StageError;
use crate::pipeline::context::JobContext;
use crate::pipeline::plan::{StagePlan, StagePlanner};
use crate::pipeline::stage::{PendingTask, StageExecutor, StageKind, StageOutcome};
use crate::request::GenerationRequest;
use crate::task::{ExternalTask, StageInput, SubmitOutcome, TaskClient};

/// A stage backed by an external generation provider.
///
/// Submission is the only provider call made here; if the provider queues the
/// work, the returned `PendingTask` is handed to the polling driver.
pub struct ProviderStage {
    kind: StageKind,
    client: Arc<dyn TaskClient>,
}

impl ProviderStage {
    pub fn new(kind: StageKind, client: Arc<dyn TaskClient>) -> Self {
        Self { kind, client }
    }
}

#[async_trait]
impl StageExecutor for ProviderStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn execute(&self, ctx: &JobContext) -> StageOutcome {
        let input = StageInput {
            stage: self.kind.name(),
            prompt: build_prompt(&self.kind, ctx),
            request: ctx.request.clone(),
        };

        match self.client.submit(&input).await {
            Ok(SubmitOutcome::Done(artifact)) => StageOutcome::Done(artifact),
            Ok(SubmitOutcome::Queued(handle)) => StageOutcome::Pending(PendingTask {
                task: ExternalTask::new(self.client.provider(), handle),
                client: Arc::clone(&self.client),
            }),
            Ok(SubmitOutcome::Failed(error)) => StageOutcome::Failed(error),
            Err(error) => StageOutcome::Failed(error),
        }
    }

    fn substitute(&self, ctx: &JobContext) -> Option<Artifact> {
        Some(placeholder_artifact(&self.kind, ctx))
    }
}

/// Final local stage: stitches the clip and audio references into the final
/// cut manifest. Runs in-process, no provider involved, so it has no
/// fallback substitute.
pub struct AssemblyStage;

#[async_trait]
impl StageExecutor for AssemblyStage {
    fn kind(&self) -> StageKind {
        StageKind::Assembly
    }

    async fn execute(&self, ctx: &JobContext) -> StageOutcome {
        let clips = ctx.clip_references();
        if clips.len() != ctx.request.scene_count as usize {
            return StageOutcome::Failed(StageError::Internal(format!(
                "assembly expected {} clips, found {}",
                ctx.request.scene_count,
                clips.len()
            )));
        }

        let audio = match ctx.artifact(&StageKind::Audio.name()) {
            Some(artifact) => artifact,
            None => {
                return StageOutcome::Failed(StageError::Internal(
                    "assembly reached without an audio track".to_string(),
                ));
            }
        };

        let manifest = json!({
            "clips": clips,
            "audio": audio.reference,
            "durationSecs": ctx.request.duration_secs,
        });

        let mut artifact = Artifact::real(
            self.kind().artifact_kind(),
            format!("final://{}", ctx.job_id),
        )
        .with_data(manifest);
        // A cut stitched from any placeholder input is itself a placeholder.
        artifact.simulated = ctx.results.iter().any(|r| r.artifact.simulated);

        StageOutcome::Done(artifact)
    }
}

/// The standard story pipeline: idea, scene script, one clip per scene
/// rendered concurrently, audio, assembly.
pub struct StandardPlanner {
    script_client: Arc<dyn TaskClient>,
    clip_client: Arc<dyn TaskClient>,
    audio_client: Arc<dyn TaskClient>,
}

impl StandardPlanner {
    pub fn new(
        script_client: Arc<dyn TaskClient>,
        clip_client: Arc<dyn TaskClient>,
        audio_client: Arc<dyn TaskClient>,
    ) -> Self {
        Self {
            script_client,
            clip_client,
            audio_client,
        }
    }
}

impl StagePlanner for StandardPlanner {
    fn plan(&self, request: &GenerationRequest) -> StagePlan {
        let clips: Vec<Arc<dyn StageExecutor>> = (1..=request.scene_count)
            .map(|n| {
                Arc::new(ProviderStage::new(
                    StageKind::Clip(n),
                    Arc::clone(&self.clip_client),
                )) as Arc<dyn StageExecutor>
            })
            .collect();

        StagePlan::new()
            .then(Arc::new(ProviderStage::new(
                StageKind::Idea,
                Arc::clone(&self.script_client),
            )))
            .then(Arc::new(ProviderStage::new(
                StageKind::Scenes,
                Arc::clone(&self.script_client),
            )))
            .then_parallel(clips)
            .then(Arc::new(ProviderStage::new(
                StageKind::Audio,
                Arc::clone(&self.audio_client),
            )))
            .then(Arc::new(AssemblyStage))
    }
}

fn build_prompt(kind: &StageKind, ctx: &JobContext) -> String {
    let req = &ctx.request;
    match kind {
        StageKind::Idea => format!(
            "Write a short story idea about \"{}\" in a {} style, in {}, \
             suitable for a {}-second video.",
            req.theme, req.style, req.language, req.duration_secs
        ),
        StageKind::Scenes => format!(
            "Split the story into exactly {} scenes with one visual \
             description each.\n\nStory: {}",
            req.scene_count,
            source_text(ctx, &StageKind::Idea.name())
        ),
        StageKind::Clip(n) => format!(
            "Render scene {} of {} as a video clip in a {} style.\n\n\
             Scene script: {}",
            n,
            req.scene_count,
            req.style,
            source_text(ctx, &StageKind::Scenes.name())
        ),
        StageKind::Audio => format!(
            "Compose a {}-second audio track in {} matching this scene \
             script.\n\nScene script: {}",
            req.duration_secs,
            req.language,
            source_text(ctx, &StageKind::Scenes.name())
        ),
        StageKind::Assembly => String::new(),
    }
}

/// Inline text of an earlier artifact, falling back to its reference.
fn source_text(ctx: &JobContext, stage: &str) -> String {
    ctx.artifact(stage)
        .map(|a| {
            a.data
                .as_ref()
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| a.reference.clone())
        })
        .unwrap_or_default()
}

/// Deterministic placeholder for a stage, stable across invocations for the
/// same job so idempotent finalization compares equal.
fn placeholder_artifact(kind: &StageKind, ctx: &JobContext) -> Artifact {
    Artifact::placeholder(
        kind.artifact_kind(),
        format!("simulated://{}/{}", ctx.job_id, kind.name()),
    )
    .with_data(json!({
        "stage": kind.name(),
        "theme": ctx.request.theme,
    }))
}
