use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::timeline::NarrationSegment;

/// One subtitle cue, spanning one or more consecutive narration segments on
/// the measured-audio axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
    /// Index range of the narration segments merged into this cue.
    pub first_segment: usize,
    pub last_segment: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("got {durations} measured durations for {segments} narration segments")]
    LengthMismatch { segments: usize, durations: usize },

    #[error("chunk size must be positive")]
    ZeroChunkSize,
}

struct PendingCue<'a> {
    start: Duration,
    length: Duration,
    first: usize,
    last: usize,
    texts: Vec<&'a str>,
}

impl<'a> PendingCue<'a> {
    fn close(self) -> SubtitleCue {
        SubtitleCue {
            start: self.start,
            end: self.start + self.length,
            text: self.texts.join(" "),
            first_segment: self.first,
            last_segment: self.last,
        }
    }
}

/// Groups consecutive segments into cues of at most `chunk_size` measured
/// duration.
///
/// A cue is closed before appending a segment that would push it strictly
/// past `chunk_size`; landing exactly on `chunk_size` keeps the segment in the
/// current cue. A single segment longer than `chunk_size` forms its own cue
/// and is never split. Cue boundaries are the running sum of `durations`, not
/// the planned timestamps.
pub fn chunk_cues(
    narration: &[NarrationSegment],
    durations: &[Duration],
    chunk_size: Duration,
) -> Result<Vec<SubtitleCue>, ChunkError> {
    if narration.len() != durations.len() {
        return Err(ChunkError::LengthMismatch {
            segments: narration.len(),
            durations: durations.len(),
        });
    }
    if chunk_size.is_zero() {
        return Err(ChunkError::ZeroChunkSize);
    }

    let mut cues = Vec::new();
    let mut offset = Duration::ZERO;
    let mut pending: Option<PendingCue<'_>> = None;

    for (index, (segment, &duration)) in narration.iter().zip(durations).enumerate() {
        if let Some(cue) = pending.take() {
            if cue.length + duration > chunk_size {
                cues.push(cue.close());
            } else {
                pending = Some(cue);
            }
        }

        let cue = pending.get_or_insert_with(|| PendingCue {
            start: offset,
            length: Duration::ZERO,
            first: index,
            last: index,
            texts: Vec::new(),
        });
        cue.length += duration;
        cue.last = index;
        let text = segment.text.trim();
        if !text.is_empty() {
            cue.texts.push(text);
        }

        offset += duration;
    }

    if let Some(cue) = pending {
        cues.push(cue.close());
    }

    Ok(cues)
}
