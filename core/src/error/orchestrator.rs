use thiserror::Error;

use super::ErrorKind;
use crate::state::{TaskId, TaskState, TransitionError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {0} already exists")]
    Duplicate(TaskId),

    #[error("task {0} already has a pipeline run")]
    AlreadyRunning(TaskId),

    #[error("task {task_id}: {source}")]
    Transition {
        task_id: TaskId,
        #[source]
        source: TransitionError,
    },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {task_id} is {state}, not awaiting script review")]
    NotAwaitingReview { task_id: TaskId, state: TaskState },

    #[error("refinement failed: {0}")]
    Refinement(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id.to_string()),
            other => Self::Store(other),
        }
    }
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotAwaitingReview { .. } => ErrorKind::Validation,
            Self::Refinement(_) => ErrorKind::StageExhausted,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}
