//! Synchronization rules for a [`Timeline`].

use std::time::Duration;
use thiserror::Error;

use super::types::{Timeline, VOICE_PARAM_MAX, VOICE_PARAM_MIN};

/// A timeline that downstream stages must not see. Never repaired, always
/// reported with the offending segment index.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("timeline out of sync at segment {segment_index}: {reason}")]
pub struct SyncError {
    pub reason: SyncReason,
    pub segment_index: usize,
}

impl SyncError {
    fn at(segment_index: usize, reason: SyncReason) -> Self {
        Self {
            reason,
            segment_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncReason {
    #[error("narration track is empty")]
    EmptyNarration,

    #[error("visual track is empty")]
    EmptyVisuals,

    #[error("track lengths differ (narration={narration}, visual={visual})")]
    LengthMismatch { narration: usize, visual: usize },

    #[error("narration starts at {narration:?} but visual starts at {visual:?}")]
    StartMismatch {
        narration: Duration,
        visual: Duration,
    },

    #[error("visual track must start at zero, starts at {start:?}")]
    VisualOffset { start: Duration },

    #[error("visual window {start:?}..{end:?} is empty")]
    EmptyWindow { start: Duration, end: Duration },

    #[error("visual window starts at {start:?} but previous window ends at {previous_end:?}")]
    VisualGap {
        previous_end: Duration,
        start: Duration,
    },

    #[error("narration starts at {start:?}, before previous segment at {previous:?}")]
    NarrationOutOfOrder { previous: Duration, start: Duration },

    #[error("voice {param} {value} outside [0.5, 2.0]")]
    VoiceOutOfRange { param: &'static str, value: f32 },
}

/// Checks every invariant the image, audio, subtitle and assembly stages rely
/// on. Reports the first violation in segment order.
pub fn validate(timeline: &Timeline) -> Result<(), SyncError> {
    let narration = &timeline.narration;
    let visuals = &timeline.visuals;

    if narration.is_empty() {
        return Err(SyncError::at(0, SyncReason::EmptyNarration));
    }
    if visuals.is_empty() {
        return Err(SyncError::at(0, SyncReason::EmptyVisuals));
    }
    if narration.len() != visuals.len() {
        return Err(SyncError::at(
            narration.len().min(visuals.len()),
            SyncReason::LengthMismatch {
                narration: narration.len(),
                visual: visuals.len(),
            },
        ));
    }
    if visuals[0].start != Duration::ZERO {
        return Err(SyncError::at(
            0,
            SyncReason::VisualOffset {
                start: visuals[0].start,
            },
        ));
    }

    for (i, (spoken, shown)) in narration.iter().zip(visuals.iter()).enumerate() {
        if spoken.start != shown.start {
            return Err(SyncError::at(
                i,
                SyncReason::StartMismatch {
                    narration: spoken.start,
                    visual: shown.start,
                },
            ));
        }

        if shown.end <= shown.start {
            return Err(SyncError::at(
                i,
                SyncReason::EmptyWindow {
                    start: shown.start,
                    end: shown.end,
                },
            ));
        }

        if i > 0 {
            let previous_end = visuals[i - 1].end;
            if previous_end != shown.start {
                return Err(SyncError::at(
                    i,
                    SyncReason::VisualGap {
                        previous_end,
                        start: shown.start,
                    },
                ));
            }

            let previous = narration[i - 1].start;
            if spoken.start < previous {
                return Err(SyncError::at(
                    i,
                    SyncReason::NarrationOutOfOrder {
                        previous,
                        start: spoken.start,
                    },
                ));
            }
        }

        for (param, value) in [("speed", spoken.voice.speed), ("pitch", spoken.voice.pitch)] {
            if !(VOICE_PARAM_MIN..=VOICE_PARAM_MAX).contains(&value) {
                return Err(SyncError::at(i, SyncReason::VoiceOutOfRange { param, value }));
            }
        }
    }

    Ok(())
}

/// Span covered by the visual track, which is contiguous by construction.
pub fn total_planned_duration(timeline: &Timeline) -> Duration {
    match (timeline.visuals.first(), timeline.visuals.last()) {
        (Some(first), Some(last)) => last.end.saturating_sub(first.start),
        _ => Duration::ZERO,
    }
}
