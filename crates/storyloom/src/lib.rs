//! Storyloom is a generation job orchestrator: it drives multi-stage
//! content pipelines (story idea, scene script, per-scene clips, audio,
//! final assembly) against external asynchronous generation providers.
//!
//! The crate's core pieces are the [`job::JobStore`] state machine, the
//! [`task::poller`] driving external tasks to resolution, the
//! [`pipeline::fallback`] policy substituting deterministic placeholders
//! when providers fail, and the fingerprint-keyed [`cache::ResultCache`].
//! Embedders implement [`task::TaskClient`] per provider and interact
//! through [`GenerationService`].

pub mod artifact;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod pipeline;
pub mod request;
pub mod service;
pub mod task;

pub use artifact::{Artifact, ArtifactKind, StageResult};
pub use broadcast::{JobEvent, JobEventBroadcaster};
pub use cache::{CacheEntry, ResultCache};
pub use config::{load_config, OrchestratorConfig};
pub use error::{
    ConfigError, ErrorKind, ResultError, Result, StageError, StoreError, StoryloomError,
    SubmitError, ValidationError,
};
pub use fingerprint::fingerprint;
pub use job::{GenerationJob, JobStatus, JobStore};
pub use pipeline::{Orchestrator, StageExecutor, StageKind, StagePlan, StagePlanner, StandardPlanner};
pub use request::GenerationRequest;
pub use service::{GenerationService, JobResultView, JobStatusView, SubmitReceipt};
pub use task::{PollPolicy, PollResolution, TaskClient, TaskHandle, TaskSnapshot};

/// Initializes the global tracing subscriber for embedders that do not
/// bring their own. `RUST_LOG` controls the filter; `log` macro records
/// are bridged into tracing. Calling this twice is a no-op.
pub fn init_tracing() {
    let _ = tracing_log::LogTracer::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
