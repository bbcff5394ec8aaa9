//! Final muxing port and the reconciliation of generated artifacts onto the
//! measured-audio time axis.

mod reconcile;

pub use reconcile::{measured_durations, reconcile, ClipWindow};

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::AssemblyError;
use crate::stage::{AudioArtifact, ImageArtifact};
use crate::subtitle::SubtitleCue;
use crate::timeline::VisualSegment;

/// Everything the assembler needs, index-aligned with the timeline.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyJob {
    pub images: Vec<ImageArtifact>,
    pub clips: Vec<AudioArtifact>,
    pub cues: Vec<SubtitleCue>,
    /// Rendered `.srt` of `cues`, burned into the video when present.
    pub subtitles_path: Option<PathBuf>,
    pub visuals: Vec<VisualSegment>,
    pub output_path: PathBuf,
}

impl AssemblyJob {
    pub fn windows(&self) -> Result<Vec<ClipWindow>, AssemblyError> {
        reconcile(&self.images, &self.clips, &self.visuals)
    }
}

#[async_trait]
pub trait Assembler: Send + Sync {
    fn name(&self) -> &str;

    /// Writes the final video to `job.output_path` and returns its path.
    async fn assemble(&self, job: &AssemblyJob) -> Result<PathBuf, AssemblyError>;
}
