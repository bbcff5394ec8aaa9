//! Lifecycle states and the events emitted when they change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::TaskId;
use crate::error::ErrorKind;

/// Pipeline state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, run not started yet
    Queued,
    ScriptGenerating,
    /// Validated timeline stored; waits here in review mode
    ScriptReady,
    /// Image and audio stages in flight
    MediaGenerating,
    Assembling,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::ScriptGenerating => "script_generating",
            Self::ScriptReady => "script_ready",
            Self::MediaGenerating => "media_generating",
            Self::Assembling => "assembling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human readable stage label shown by status reads.
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "Waiting to start",
            Self::ScriptGenerating => "Generating script",
            Self::ScriptReady => "Script ready",
            Self::MediaGenerating => "Generating images and narration",
            Self::Assembling => "Assembling video",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast by the task store; carries no credentials and no artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Created {
        task_id: TaskId,
        timestamp: DateTime<Utc>,
    },
    StateChanged {
        task_id: TaskId,
        old: TaskState,
        new: TaskState,
        timestamp: DateTime<Utc>,
    },
    Progress {
        task_id: TaskId,
        media: MediaKind,
        done: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },
    SegmentDegraded {
        task_id: TaskId,
        media: MediaKind,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    TimelineRevised {
        task_id: TaskId,
        revision: u32,
        timestamp: DateTime<Utc>,
    },
    Failed {
        task_id: TaskId,
        kind: ErrorKind,
        summary: String,
        timestamp: DateTime<Utc>,
    },
    Completed {
        task_id: TaskId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Created { timestamp, .. }
            | Self::StateChanged { timestamp, .. }
            | Self::Progress { timestamp, .. }
            | Self::SegmentDegraded { timestamp, .. }
            | Self::TimelineRevised { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Completed { timestamp, .. } => *timestamp,
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Created { task_id, .. }
            | Self::StateChanged { task_id, .. }
            | Self::Progress { task_id, .. }
            | Self::SegmentDegraded { task_id, .. }
            | Self::TimelineRevised { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::Completed { task_id, .. } => *task_id,
        }
    }
}
