use std::sync::Arc;

use crate::pipeline::stage::StageExecutor;
use crate::request::GenerationRequest;

/// Ordered execution plan for one job.
///
/// Phases run strictly in sequence; the stages inside one phase run
/// concurrently (the per-scene clip stages form one parallel phase). A later
/// phase never starts before every outcome of the previous phase has been
/// folded into the job.
pub struct StagePlan {
    phases: Vec<Vec<Arc<dyn StageExecutor>>>,
}

impl StagePlan {
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    /// Appends a single-stage phase.
    pub fn then(mut self, stage: Arc<dyn StageExecutor>) -> Self {
        self.phases.push(vec![stage]);
        self
    }

    /// Appends a phase whose stages run concurrently. Empty phases are
    /// dropped.
    pub fn then_parallel(mut self, stages: Vec<Arc<dyn StageExecutor>>) -> Self {
        if !stages.is_empty() {
            self.phases.push(stages);
        }
        self
    }

    pub fn phases(&self) -> &[Vec<Arc<dyn StageExecutor>>] {
        &self.phases
    }

    pub fn stage_count(&self) -> usize {
        self.phases.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the stage plan for a request. Implementations wire concrete
/// provider clients into executors.
pub trait StagePlanner: Send + Sync {
    fn plan(&self, request: &GenerationRequest) -> StagePlan;
}
