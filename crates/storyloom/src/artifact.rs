use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of output a pipeline stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Story,
    SceneScript,
    Clip,
    AudioTrack,
    FinalCut,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Story => write!(f, "story"),
            ArtifactKind::SceneScript => write!(f, "scene_script"),
            ArtifactKind::Clip => write!(f, "clip"),
            ArtifactKind::AudioTrack => write!(f, "audio_track"),
            ArtifactKind::FinalCut => write!(f, "final_cut"),
        }
    }
}

/// Output of a single stage.
///
/// `reference` points at the produced asset (provider URL, storage key);
/// small textual payloads (story text, scene lists) ride along inline in
/// `data`. A `simulated` artifact is a deterministic placeholder substituted
/// by the fallback policy, never a real provider result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub simulated: bool,
}

impl Artifact {
    /// A real (non-simulated) artifact.
    pub fn real(kind: ArtifactKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            data: None,
            simulated: false,
        }
    }

    /// A deterministic placeholder artifact.
    pub fn placeholder(kind: ArtifactKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            data: None,
            simulated: true,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A stage's artifact as folded into the owning job, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage: String,
    pub artifact: Artifact,
    pub completed_at: DateTime<Utc>,
}

impl StageResult {
    pub fn new(stage: impl Into<String>, artifact: Artifact) -> Self {
        Self {
            stage: stage.into(),
            artifact,
            completed_at: Utc::now(),
        }
    }
}
