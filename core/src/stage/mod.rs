//! Generation stages behind uniform ports.
//!
//! The script stage turns a topic into a validated [`Timeline`]. The image and
//! audio stages are both a [`MediaStage`]: one artifact per timeline segment,
//! generated concurrently under a worker limit, with per-segment retries and
//! a placeholder once a segment's retries are spent.
//!
//! [`Timeline`]: crate::timeline::Timeline

mod audio;
pub mod fake;
mod image;
mod media;
mod retry;
mod scheduler;
mod script;
mod traits;

pub use audio::{AudioArtifact, ClipSource, SpeechGenerator, SpeechInput};
pub use image::{ImageArtifact, ImageGenerator};
pub use media::{
    MediaOutcome, MediaStage, NoProgress, ProgressSink, SegmentGenerator, SegmentPolicy,
};
pub use retry::{RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_RETRIES};
pub use scheduler::fan_out;
pub use script::{ScriptRequest, ScriptStage, WEB_CONTEXT_SNIPPETS};
pub use traits::{
    DraftRequest, ImageRenderer, RenderRequest, ScriptBackend, SegmentRequest, SpeechRequest,
    SpeechSynthesizer, SynthesizedClip,
};
