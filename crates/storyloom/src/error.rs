use std::path::PathBuf;
use thiserror::Error;

use crate::job::record::JobError;

#[derive(Error, Debug)]
pub enum StoryloomError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Result error: {0}")]
    Result(#[from] ResultError),
}

pub type Result<T> = std::result::Result<T, StoryloomError>;

/// Classification of a stage failure, used by the fallback decision table
/// and persisted in the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Provider,
    QuotaExhausted,
    TimedOut,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Provider => write!(f, "provider"),
            ErrorKind::QuotaExhausted => write!(f, "quota_exhausted"),
            ErrorKind::TimedOut => write!(f, "timed_out"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Error raised by a stage executor or an external task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Invalid stage input: {0}")]
    Validation(String),

    #[error("Provider failure: {0}")]
    Provider(String),

    #[error("Provider quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Polling budget exhausted after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("Internal state error: {0}")]
    Internal(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Validation(_) => ErrorKind::Validation,
            StageError::Provider(_) => ErrorKind::Provider,
            StageError::QuotaExhausted(_) => ErrorKind::QuotaExhausted,
            StageError::TimedOut { .. } => ErrorKind::TimedOut,
            StageError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No job found for id '{0}'")]
    NotFound(String),

    #[error("An active job already exists for this fingerprint (job '{existing}')")]
    DuplicateFingerprint { existing: String },

    #[error("Job '{id}' is already terminal ({status})")]
    InvalidTransition { id: String, status: String },

    #[error("Job '{id}' already reached a conflicting terminal state ({status})")]
    AlreadyTerminal { id: String, status: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Theme must not be empty")]
    EmptyTheme,

    #[error("Theme exceeds {max} characters")]
    ThemeTooLong { max: usize },

    #[error("Style must not be empty")]
    EmptyStyle,

    #[error("Language must not be empty")]
    EmptyLanguage,

    #[error("Duration {got}s is outside the supported range {min}-{max}s")]
    DurationOutOfRange { got: u32, min: u32, max: u32 },

    #[error("Scene count {got} is outside the supported range {min}-{max}")]
    SceneCountOutOfRange { got: u32, min: u32, max: u32 },
}

/// Errors surfaced by `GenerationService::submit_job`.
///
/// Validation failures never create a job; they are reported to the caller
/// at submission time.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Request validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job store rejected the submission: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by `GenerationService::get_result`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("No job found for id '{0}'")]
    NotFound(String),

    #[error("Job '{0}' has not completed yet")]
    NotReady(String),

    #[error("Job '{id}' was cancelled")]
    Cancelled { id: String },

    #[error("Job '{id}' failed: {error}")]
    Failed { id: String, error: JobError },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_kind_mapping() {
        assert_eq!(
            StageError::Validation("bad".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StageError::Provider("502".into()).kind(),
            ErrorKind::Provider
        );
        assert_eq!(
            StageError::QuotaExhausted("out of credits".into()).kind(),
            ErrorKind::QuotaExhausted
        );
        assert_eq!(
            StageError::TimedOut { attempts: 5 }.kind(),
            ErrorKind::TimedOut
        );
        assert_eq!(
            StageError::Internal("double finish".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::QuotaExhausted.to_string(), "quota_exhausted");
        assert_eq!(ErrorKind::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_timed_out_message_carries_attempts() {
        let err = StageError::TimedOut { attempts: 7 };
        assert!(err.to_string().contains("7 attempts"));
    }
}
