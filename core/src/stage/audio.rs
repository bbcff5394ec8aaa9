use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::media::SegmentGenerator;
use super::traits::{SpeechRequest, SpeechSynthesizer};
use crate::error::{SegmentError, SynthesisError};
use crate::state::MediaKind;
use crate::timeline::NarrationSegment;

#[derive(Debug, Clone)]
pub struct SpeechInput {
    pub segment: NarrationSegment,
    /// Planned window length; used for the silent placeholder.
    pub planned: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClipSource {
    Rendered { path: PathBuf },
    Silence,
}

/// Narration clip with its measured length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub clip: ClipSource,
    pub duration: Duration,
}

impl AudioArtifact {
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.clip {
            ClipSource::Rendered { path } => Some(path),
            ClipSource::Silence => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.clip == ClipSource::Silence
    }
}

/// Synthesizes `clip_{NNN}.<ext>` files into `dir`.
pub struct SpeechGenerator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    dir: PathBuf,
}

impl SpeechGenerator {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, dir: impl Into<PathBuf>) -> Self {
        Self {
            synthesizer,
            dir: dir.into(),
        }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("clip_{index:03}.{}", self.synthesizer.file_extension()))
    }
}

#[async_trait]
impl SegmentGenerator for SpeechGenerator {
    type Input = SpeechInput;
    type Output = AudioArtifact;

    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    async fn generate(
        &self,
        index: usize,
        input: &SpeechInput,
    ) -> Result<AudioArtifact, SegmentError> {
        let clip = self
            .synthesizer
            .synthesize(&SpeechRequest::from(&input.segment))
            .await?;
        if clip.data.is_empty() || clip.duration.is_zero() {
            return Err(SynthesisError::new("synthesizer returned an empty clip").into());
        }
        let path = self.path_for(index);
        tokio::fs::write(&path, &clip.data).await?;
        tracing::debug!(
            target: "forgetube.media",
            index,
            synthesizer = self.synthesizer.name(),
            duration_ms = clip.duration.as_millis() as u64,
            "clip written"
        );
        Ok(AudioArtifact {
            clip: ClipSource::Rendered { path },
            duration: clip.duration,
        })
    }

    fn placeholder(&self, _index: usize, input: &SpeechInput) -> AudioArtifact {
        AudioArtifact {
            clip: ClipSource::Silence,
            duration: input.planned,
        }
    }
}
