//! Errors raised inside the generation stages and the assembler.

use thiserror::Error;

use super::ErrorKind;
use crate::subtitle::ChunkError;
use crate::timeline::ScriptParseError;

#[derive(Debug, Clone, Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Error)]
#[error("synthesis failed: {message}")]
pub struct SynthesisError {
    pub message: String,
}

impl SynthesisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for SynthesisError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// One failed attempt at a single media segment.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Render(_) => ErrorKind::Render,
            Self::Synthesis(_) => ErrorKind::Synthesis,
            Self::Io(_) => ErrorKind::Internal,
        }
    }
}

/// One failed attempt of the script stage.
#[derive(Debug, Error)]
pub enum ScriptAttemptError {
    #[error("script backend call failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Parse(#[from] ScriptParseError),
}

impl ScriptAttemptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(_) => ErrorKind::Backend,
            Self::Parse(_) => ErrorKind::Validation,
        }
    }

    pub fn segment_index(&self) -> Option<usize> {
        match self {
            Self::Backend(_) => None,
            Self::Parse(e) => e.segment_index(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage exhausted after {attempts} attempt(s): {last}")]
    Exhausted {
        stage: &'static str,
        attempts: u32,
        last: ScriptAttemptError,
    },

    #[error("stage cancelled")]
    Cancelled,
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Exhausted { .. } => ErrorKind::StageExhausted,
            Self::Cancelled => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("artifacts misaligned (images={images}, clips={clips}, windows={windows})")]
    Misaligned {
        images: usize,
        clips: usize,
        windows: usize,
    },

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("assembly io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("subtitle derivation failed: {0}")]
    Subtitles(#[from] ChunkError),
}
