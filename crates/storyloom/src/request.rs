use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum theme length accepted at submission time.
const MAX_THEME_LENGTH: usize = 500;

/// Supported clip duration range in seconds.
const MIN_DURATION_SECS: u32 = 5;
const MAX_DURATION_SECS: u32 = 600;

/// Supported number of scenes (one clip is generated per scene).
const MIN_SCENE_COUNT: u32 = 1;
const MAX_SCENE_COUNT: u32 = 12;

/// A content-generation request as received from the API layer.
///
/// Only `theme`, `style`, `language`, `duration_secs` and `scene_count`
/// affect the generated output; `trace_id` is client-supplied plumbing and
/// is excluded from the request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub theme: String,
    pub style: String,
    pub language: String,
    pub duration_secs: u32,
    pub scene_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        theme: impl Into<String>,
        style: impl Into<String>,
        language: impl Into<String>,
        duration_secs: u32,
        scene_count: u32,
    ) -> Self {
        Self {
            theme: theme.into(),
            style: style.into(),
            language: language.into(),
            duration_secs,
            scene_count,
            trace_id: None,
        }
    }

    /// Validates the request before any job is created.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.theme.trim().is_empty() {
            return Err(ValidationError::EmptyTheme);
        }
        if self.theme.len() > MAX_THEME_LENGTH {
            return Err(ValidationError::ThemeTooLong {
                max: MAX_THEME_LENGTH,
            });
        }
        if self.style.trim().is_empty() {
            return Err(ValidationError::EmptyStyle);
        }
        if self.language.trim().is_empty() {
            return Err(ValidationError::EmptyLanguage);
        }
        if self.duration_secs < MIN_DURATION_SECS || self.duration_secs > MAX_DURATION_SECS {
            return Err(ValidationError::DurationOutOfRange {
                got: self.duration_secs,
                min: MIN_DURATION_SECS,
                max: MAX_DURATION_SECS,
            });
        }
        if self.scene_count < MIN_SCENE_COUNT || self.scene_count > MAX_SCENE_COUNT {
            return Err(ValidationError::SceneCountOutOfRange {
                got: self.scene_count,
                min: MIN_SCENE_COUNT,
                max: MAX_SCENE_COUNT,
            });
        }
        Ok(())
    }
}
