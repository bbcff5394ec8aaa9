//! Synchronized script schema.
//!
//! A [`Timeline`] carries two tracks that describe the same time windows:
//! narration (what is spoken) and visuals (what is on screen). Every stage
//! below the script stage addresses artifacts by segment index, so the tracks
//! must stay index-aligned; [`validate`] is the gate that enforces it.

pub mod raw;
mod types;
mod validate;

pub use raw::{
    extract_json, format_timestamp, parse_script, parse_timestamp, RawScript, ScriptParseError,
};
pub use types::{
    Emotion, NarrationSegment, RenderParams, Timeline, VisualSegment, VoiceParams,
    VOICE_PARAM_MAX, VOICE_PARAM_MIN,
};
pub use validate::{total_planned_duration, validate, SyncError, SyncReason};
