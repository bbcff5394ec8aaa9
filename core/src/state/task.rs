use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::types::{MediaKind, TaskState};
use crate::error::{ErrorKind, TaskError};
use crate::stage::{AudioArtifact, ImageArtifact};
use crate::timeline::Timeline;

/// Random v4 id; not guessable by other callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// API keys forwarded to the script backend. Deliberately not `Serialize`.
#[derive(Clone, Default)]
pub struct Credentials {
    llm_api_key: String,
    search_api_key: String,
}

impl Credentials {
    pub fn new(llm_api_key: impl Into<String>, search_api_key: impl Into<String>) -> Self {
        Self {
            llm_api_key: llm_api_key.into(),
            search_api_key: search_api_key.into(),
        }
    }

    pub fn llm_api_key(&self) -> &str {
        &self.llm_api_key
    }

    pub fn search_api_key(&self) -> &str {
        &self.search_api_key
    }

    pub fn is_complete(&self) -> bool {
        !self.llm_api_key.trim().is_empty() && !self.search_api_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("search_api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub images: Option<Vec<ImageArtifact>>,
    pub audio: Option<Vec<AudioArtifact>>,
    pub subtitles: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub images: StageProgress,
    pub audio: StageProgress,
}

impl TaskProgress {
    pub fn stage_mut(&mut self, media: MediaKind) -> &mut StageProgress {
        match media {
            MediaKind::Image => &mut self.images,
            MediaKind::Audio => &mut self.audio,
        }
    }
}

/// A segment whose generator gave up and was replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedSegment {
    pub media: MediaKind,
    pub index: usize,
    pub attempts: u32,
    pub kind: ErrorKind,
    pub error: String,
}

/// Full task record. Only the task store hands it out, and only to the run
/// that owns it; callers read [`TaskStatus`].
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub topic: String,
    pub requested_duration: Duration,
    pub key_points: Vec<String>,
    pub review: bool,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeline: Option<Timeline>,
    pub timeline_revision: u32,
    pub artifacts: Artifacts,
    pub last_error: Option<TaskError>,
    pub credentials: Credentials,
    pub history: Vec<(TaskState, DateTime<Utc>)>,
    pub progress: TaskProgress,
    pub degraded: Vec<DegradedSegment>,
}

impl Task {
    pub fn new(
        topic: impl Into<String>,
        requested_duration: Duration,
        key_points: Vec<String>,
        credentials: Credentials,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            topic: topic.into(),
            requested_duration,
            key_points,
            review: false,
            state: TaskState::Queued,
            created_at: now,
            updated_at: now,
            timeline: None,
            timeline_revision: 0,
            artifacts: Artifacts::default(),
            last_error: None,
            credentials,
            history: vec![(TaskState::Queued, now)],
            progress: TaskProgress::default(),
            degraded: Vec::new(),
        }
    }

    pub fn with_review(mut self, review: bool) -> Self {
        self.review = review;
        self
    }

    pub fn states_visited(&self) -> Vec<TaskState> {
        self.history.iter().map(|(s, _)| *s).collect()
    }

    pub fn elapsed_ms(&self) -> u64 {
        (self.updated_at - self.created_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus {
            id: self.id,
            topic: self.topic.clone(),
            state: self.state,
            stage_label: self.state.label().to_string(),
            error_summary: self.last_error.as_ref().map(|e| e.summary.clone()),
            error_kind: self.last_error.as_ref().map(|e| e.kind),
            result_ref: self.artifacts.video.clone(),
            progress: self.progress,
            degraded: self.degraded.clone(),
            script_revision: self.timeline.as_ref().map(|_| self.timeline_revision),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Caller-facing snapshot of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: TaskId,
    pub topic: String,
    pub state: TaskState,
    pub stage_label: String,
    pub error_summary: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub result_ref: Option<PathBuf>,
    pub progress: TaskProgress,
    pub degraded: Vec<DegradedSegment>,
    pub script_revision: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
