use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories surfaced to callers through a task's `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeline failed synchronization checks or model output did not parse.
    Validation,
    /// A stage used up its retry budget.
    StageExhausted,
    /// An external generator call failed outright.
    Backend,
    Render,
    Synthesis,
    Assembly,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::StageExhausted => "stage_exhausted",
            Self::Backend => "backend",
            Self::Render => "render",
            Self::Synthesis => "synthesis",
            Self::Assembly => "assembly",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only error record a caller ever sees for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    /// Originating kind when `kind` wraps another failure, e.g. the
    /// validation error behind an exhausted script stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorKind>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
}

impl TaskError {
    pub fn new(kind: ErrorKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            cause: None,
            summary: summary.into(),
            segment_index: None,
        }
    }

    pub fn internal(summary: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, summary)
    }

    pub fn with_cause(mut self, cause: ErrorKind) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn at_segment(mut self, index: Option<usize>) -> Self {
        self.segment_index = index;
        self
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.summary)
    }
}

impl std::error::Error for TaskError {}

/// Top-level error of the `forgetube` binary.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("pipeline failed: {0}")]
    Pipeline(TaskError),
    #[error(transparent)]
    Orchestrator(#[from] super::OrchestratorError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
