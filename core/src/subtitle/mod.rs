//! Subtitle track derived from narration and measured clip durations.

mod chunker;
mod srt;

pub use chunker::{chunk_cues, ChunkError, SubtitleCue};
pub use srt::{format_srt_timestamp, render_srt};
