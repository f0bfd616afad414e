//! Centralized fallback decision table.
//!
//! Invoked once per failed stage, never more: a single failure yields a
//! single decision, and the orchestrator never re-runs the external call.

use crate::artifact::Artifact;
use crate::error::{ErrorKind, StageError};

/// What to do about a failed stage.
#[derive(Debug, Clone)]
pub enum FallbackDecision {
    /// Continue the job with a placeholder artifact marked `simulated`.
    Substitute(Artifact),
    /// Fail the job with this error.
    Abort(StageError),
}

/// Decision table:
/// provider failures, quota exhaustion and polling timeouts degrade to the
/// stage's substitute when one exists; validation and internal errors always
/// abort, as does any failure of a stage without a substitute.
pub fn decide(error: StageError, substitute: Option<Artifact>) -> FallbackDecision {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::Internal => FallbackDecision::Abort(error),
        ErrorKind::Provider | ErrorKind::QuotaExhausted | ErrorKind::TimedOut => match substitute {
            Some(mut artifact) => {
                artifact.simulated = true;
                FallbackDecision::Substitute(artifact)
            }
            None => FallbackDecision::Abort(error),
        },
    }
}
