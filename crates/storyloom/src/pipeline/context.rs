use crate::artifact::{Artifact, StageResult};
use crate::request::GenerationRequest;

/// Per-job working state handed to stage executors.
///
/// Executors read earlier stage artifacts from here; only the orchestrator
/// folds new results in, between phases, so executors running in parallel
/// within a phase all see the same frozen snapshot.
pub struct JobContext {
    pub job_id: String,
    pub request: GenerationRequest,
    pub results: Vec<StageResult>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, request: GenerationRequest) -> Self {
        Self {
            job_id: job_id.into(),
            request,
            results: Vec::new(),
        }
    }

    /// Artifact of a previously completed stage, by stage name.
    pub fn artifact(&self, stage: &str) -> Option<&Artifact> {
        self.results
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.artifact)
    }

    pub fn fold(&mut self, result: StageResult) {
        self.results.push(result);
    }

    /// Clip artifact references in scene order.
    pub fn clip_references(&self) -> Vec<&str> {
        let mut clips: Vec<(u32, &str)> = self
            .results
            .iter()
            .filter_map(|r| {
                r.stage
                    .strip_prefix("clip-")
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|n| (n, r.artifact.reference.as_str()))
            })
            .collect();
        clips.sort_by_key(|(n, _)| *n);
        clips.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;

    fn ctx() -> JobContext {
        JobContext::new(
            "job-1",
            GenerationRequest::new("theme", "style", "en", 60, 3),
        )
    }

    #[test]
    fn test_artifact_lookup_by_stage_name() {
        let mut ctx = ctx();
        ctx.fold(StageResult::new(
            "idea",
            Artifact::real(ArtifactKind::Story, "inline"),
        ));

        assert!(ctx.artifact("idea").is_some());
        assert!(ctx.artifact("scenes").is_none());
    }

    #[test]
    fn test_clip_references_sorted_by_scene_index() {
        let mut ctx = ctx();
        // Folded out of order, as parallel clips complete.
        ctx.fold(StageResult::new(
            "clip-2",
            Artifact::real(ArtifactKind::Clip, "clip-2.mp4"),
        ));
        ctx.fold(StageResult::new(
            "clip-1",
            Artifact::real(ArtifactKind::Clip, "clip-1.mp4"),
        ));
        ctx.fold(StageResult::new(
            "clip-3",
            Artifact::real(ArtifactKind::Clip, "clip-3.mp4"),
        ));

        assert_eq!(
            ctx.clip_references(),
            vec!["clip-1.mp4", "clip-2.mp4", "clip-3.mp4"]
        );
    }

    #[test]
    fn test_clip_references_ignore_other_stages() {
        let mut ctx = ctx();
        ctx.fold(StageResult::new(
            "audio",
            Artifact::real(ArtifactKind::AudioTrack, "track.mp3"),
        ));
        assert!(ctx.clip_references().is_empty());
    }
}
