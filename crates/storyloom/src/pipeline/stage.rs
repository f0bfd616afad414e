use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::StageError;
use crate::pipeline::context::JobContext;
use crate::task::{ExternalTask, TaskClient};

/// Identity of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Idea,
    Scenes,
    Clip(u32),
    Audio,
    Assembly,
}

impl StageKind {
    /// Stable stage name used as the key in `stage_results`.
    pub fn name(&self) -> String {
        match self {
            StageKind::Idea => "idea".to_string(),
            StageKind::Scenes => "scenes".to_string(),
            StageKind::Clip(n) => format!("clip-{}", n),
            StageKind::Audio => "audio".to_string(),
            StageKind::Assembly => "assembly".to_string(),
        }
    }

    /// Human-readable label shown as the job's current step.
    pub fn label(&self) -> String {
        match self {
            StageKind::Idea => "Drafting story idea".to_string(),
            StageKind::Scenes => "Writing scene script".to_string(),
            StageKind::Clip(n) => format!("Rendering clip {}", n),
            StageKind::Audio => "Composing audio track".to_string(),
            StageKind::Assembly => "Assembling final cut".to_string(),
        }
    }

    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            StageKind::Idea => ArtifactKind::Story,
            StageKind::Scenes => ArtifactKind::SceneScript,
            StageKind::Clip(_) => ArtifactKind::Clip,
            StageKind::Audio => ArtifactKind::AudioTrack,
            StageKind::Assembly => ArtifactKind::FinalCut,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A provider task handed off to the polling driver together with the
/// client that can observe it.
pub struct PendingTask {
    pub task: ExternalTask,
    pub client: Arc<dyn TaskClient>,
}

/// Outcome of invoking a stage executor once.
pub enum StageOutcome {
    /// Synchronous success.
    Done(Artifact),
    /// Work was accepted by a provider; the orchestrator resumes this stage
    /// through the polling driver.
    Pending(PendingTask),
    /// Synchronous failure.
    Failed(StageError),
}

/// One step of the content pipeline.
///
/// Executors are invoked at most once per job per stage and never touch the
/// job store; only the orchestrator folds outcomes into the job.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn execute(&self, ctx: &JobContext) -> StageOutcome;

    /// Deterministic placeholder the fallback policy may substitute when a
    /// provider fails or times out. `None` means the stage has no fallback
    /// and a failure aborts the job.
    fn substitute(&self, _ctx: &JobContext) -> Option<Artifact> {
        None
    }
}
