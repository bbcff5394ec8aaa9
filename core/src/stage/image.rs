use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::media::SegmentGenerator;
use super::traits::{ImageRenderer, RenderRequest};
use crate::error::{RenderError, SegmentError};
use crate::state::MediaKind;
use crate::timeline::VisualSegment;

/// Still for one visual window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageArtifact {
    Rendered { path: PathBuf },
    /// Black frame of the planned size, drawn by the assembler.
    Placeholder { width: u32, height: u32 },
}

impl ImageArtifact {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Rendered { path } => Some(path),
            Self::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

/// Renders `scene_{NNN}.<ext>` files into `dir`.
pub struct ImageGenerator {
    renderer: Arc<dyn ImageRenderer>,
    dir: PathBuf,
}

impl ImageGenerator {
    pub fn new(renderer: Arc<dyn ImageRenderer>, dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            dir: dir.into(),
        }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("scene_{index:03}.{}", self.renderer.file_extension()))
    }
}

#[async_trait]
impl SegmentGenerator for ImageGenerator {
    type Input = VisualSegment;
    type Output = ImageArtifact;

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn generate(
        &self,
        index: usize,
        input: &VisualSegment,
    ) -> Result<ImageArtifact, SegmentError> {
        let request = RenderRequest::from(&input.render);
        let bytes = self.renderer.render(&request).await?;
        if bytes.is_empty() {
            return Err(RenderError::new("renderer returned an empty image").into());
        }
        let path = self.path_for(index);
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(
            target: "forgetube.media",
            index,
            renderer = self.renderer.name(),
            path = %path.display(),
            "image written"
        );
        Ok(ImageArtifact::Rendered { path })
    }

    fn placeholder(&self, _index: usize, input: &VisualSegment) -> ImageArtifact {
        ImageArtifact::Placeholder {
            width: input.render.width,
            height: input.render.height,
        }
    }
}
