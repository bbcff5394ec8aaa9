//! Ports to the external generators.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::{RenderError, SynthesisError};
use crate::state::Credentials;
use crate::timeline::{Emotion, NarrationSegment, RenderParams};

#[derive(Debug, Clone, PartialEq)]
pub struct DraftRequest {
    pub topic: String,
    pub duration: Duration,
    pub key_points: Vec<String>,
    /// Search snippets joined into one paragraph; empty when search failed.
    pub web_context: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    /// Draft (or existing script) as JSON text.
    pub draft: String,
    pub duration: Duration,
    /// Reviewer feedback when refining an existing script.
    pub feedback: Option<String>,
    /// Problems found in earlier attempts, oldest first.
    pub guidance: Vec<String>,
}

/// LLM and search provider behind the script stage.
#[async_trait]
pub trait ScriptBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, credentials: &Credentials) -> anyhow::Result<Vec<String>>;

    /// Returns the raw model text of an unsegmented outline.
    async fn generate_draft(
        &self,
        request: &DraftRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<String>;

    /// Returns the raw model text of a segmented script.
    async fn segment(
        &self,
        request: &SegmentRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub style: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl From<&RenderParams> for RenderRequest {
    fn from(p: &RenderParams) -> Self {
        Self {
            prompt: p.prompt.clone(),
            negative_prompt: p.negative_prompt.clone(),
            style: p.style.clone(),
            steps: p.steps,
            guidance_scale: p.guidance_scale,
            width: p.width,
            height: p.height,
            seed: p.seed,
        }
    }
}

#[async_trait]
pub trait ImageRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn file_extension(&self) -> &str {
        "png"
    }

    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub text: String,
    pub speaker: String,
    pub speed: f32,
    pub pitch: f32,
    pub emotion: Emotion,
}

impl From<&NarrationSegment> for SpeechRequest {
    fn from(s: &NarrationSegment) -> Self {
        Self {
            text: s.text.clone(),
            speaker: s.voice.speaker.clone(),
            speed: s.voice.speed,
            pitch: s.voice.pitch,
            emotion: s.voice.emotion,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    pub data: Vec<u8>,
    /// Measured playback length of `data`.
    pub duration: Duration,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    fn file_extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<SynthesizedClip, SynthesisError>;
}
