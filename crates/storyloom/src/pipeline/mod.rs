pub mod context;
pub mod executors;
pub mod fallback;
pub mod plan;
pub mod runner;
pub mod stage;

pub use context::JobContext;
pub use executors::{AssemblyStage, ProviderStage, StandardPlanner};
pub use fallback::{decide, FallbackDecision};
pub use plan::{StagePlan, StagePlanner};
pub use runner::Orchestrator;
pub use stage::{PendingTask, StageExecutor, StageKind, StageOutcome};
