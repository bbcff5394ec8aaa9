//! Wire form of a script as emitted by the segmentation model, plus the
//! lenient JSON extraction needed to read model output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use super::types::{
    Emotion, NarrationSegment, RenderParams, Timeline, VisualSegment, VoiceParams,
};
use super::validate::SyncError;

#[derive(Debug, Error)]
pub enum ScriptParseError {
    #[error("no JSON object found in model output")]
    NoJson,

    #[error("invalid script JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp '{value}' in {track} segment {index}")]
    Timestamp {
        track: &'static str,
        index: usize,
        value: String,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ScriptParseError {
    /// Segment index of the violation, when the failure is tied to one.
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            Self::Timestamp { index, .. } => Some(*index),
            Self::Sync(e) => Some(e.segment_index),
            Self::NoJson | Self::Json(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScript {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub audio_script: Vec<RawAudioSegment>,
    #[serde(default)]
    pub visual_script: Vec<RawVisualSegment>,
}

/// Models emit either `"01:05"` strings or plain second counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(f64),
    Text(String),
}

impl RawTimestamp {
    fn to_duration(&self) -> Option<Duration> {
        match self {
            Self::Seconds(s) => Duration::try_from_secs_f64(*s).ok(),
            Self::Text(t) => parse_timestamp(t),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Seconds(s) => s.to_string(),
            Self::Text(t) => t.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAudioSegment {
    pub timestamp: RawTimestamp,
    pub text: String,
    #[serde(default = "default_speaker")]
    pub speaker: String,
    #[serde(default = "default_voice_param")]
    pub speed: f32,
    #[serde(default = "default_voice_param")]
    pub pitch: f32,
    #[serde(default)]
    pub emotion: Emotion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVisualSegment {
    pub timestamp_start: RawTimestamp,
    pub timestamp_end: RawTimestamp,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_speaker() -> String {
    VoiceParams::default().speaker
}

fn default_voice_param() -> f32 {
    1.0
}

fn default_style() -> String {
    RenderParams::default().style
}

fn default_guidance_scale() -> f32 {
    RenderParams::default().guidance_scale
}

fn default_steps() -> u32 {
    RenderParams::default().steps
}

fn default_width() -> u32 {
    RenderParams::default().width
}

fn default_height() -> u32 {
    RenderParams::default().height
}

impl RawScript {
    /// Converts timestamps and parameters. Does not validate synchronization.
    pub fn into_timeline(self) -> Result<Timeline, ScriptParseError> {
        let narration = self
            .audio_script
            .into_iter()
            .enumerate()
            .map(|(index, seg)| {
                let start = seg.timestamp.to_duration().ok_or_else(|| {
                    ScriptParseError::Timestamp {
                        track: "audio",
                        index,
                        value: seg.timestamp.describe(),
                    }
                })?;
                Ok(NarrationSegment {
                    start,
                    text: seg.text,
                    voice: VoiceParams {
                        speaker: seg.speaker,
                        speed: seg.speed,
                        pitch: seg.pitch,
                        emotion: seg.emotion,
                    },
                })
            })
            .collect::<Result<Vec<_>, ScriptParseError>>()?;

        let visuals = self
            .visual_script
            .into_iter()
            .enumerate()
            .map(|(index, seg)| {
                let bad = |ts: &RawTimestamp| ScriptParseError::Timestamp {
                    track: "visual",
                    index,
                    value: ts.describe(),
                };
                let start = seg
                    .timestamp_start
                    .to_duration()
                    .ok_or_else(|| bad(&seg.timestamp_start))?;
                let end = seg
                    .timestamp_end
                    .to_duration()
                    .ok_or_else(|| bad(&seg.timestamp_end))?;
                Ok(VisualSegment {
                    start,
                    end,
                    render: RenderParams {
                        prompt: seg.prompt,
                        negative_prompt: seg.negative_prompt,
                        style: seg.style,
                        guidance_scale: seg.guidance_scale,
                        steps: seg.steps,
                        seed: seg.seed,
                        width: seg.width,
                        height: seg.height,
                    },
                })
            })
            .collect::<Result<Vec<_>, ScriptParseError>>()?;

        Ok(Timeline {
            topic: self.topic,
            description: self.description,
            narration,
            visuals,
        })
    }
}

impl From<&Timeline> for RawScript {
    fn from(timeline: &Timeline) -> Self {
        Self {
            topic: timeline.topic.clone(),
            description: timeline.description.clone(),
            audio_script: timeline
                .narration
                .iter()
                .map(|seg| RawAudioSegment {
                    timestamp: RawTimestamp::Text(format_timestamp(seg.start)),
                    text: seg.text.clone(),
                    speaker: seg.voice.speaker.clone(),
                    speed: seg.voice.speed,
                    pitch: seg.voice.pitch,
                    emotion: seg.voice.emotion,
                })
                .collect(),
            visual_script: timeline
                .visuals
                .iter()
                .map(|seg| RawVisualSegment {
                    timestamp_start: RawTimestamp::Text(format_timestamp(seg.start)),
                    timestamp_end: RawTimestamp::Text(format_timestamp(seg.end)),
                    prompt: seg.render.prompt.clone(),
                    negative_prompt: seg.render.negative_prompt.clone(),
                    style: seg.render.style.clone(),
                    guidance_scale: seg.render.guidance_scale,
                    steps: seg.render.steps,
                    seed: seg.render.seed,
                    width: seg.render.width,
                    height: seg.render.height,
                })
                .collect(),
        }
    }
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS`, each optionally with a fractional
/// seconds part.
pub fn parse_timestamp(text: &str) -> Option<Duration> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let (whole, seconds) = parts.split_at(parts.len() - 1);
    let seconds: f64 = seconds[0].trim().parse().ok()?;
    let seconds = Duration::try_from_secs_f64(seconds).ok()?;

    let mut total = 0u64;
    for part in whole {
        let v: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(v)?;
    }

    Duration::from_secs(total.checked_mul(60)?).checked_add(seconds)
}

/// `MM:SS`, or `HH:MM:SS` past the hour; milliseconds appended when present.
pub fn format_timestamp(d: Duration) -> String {
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let millis = d.subsec_millis();
    let base = if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    };
    if millis > 0 {
        format!("{base}.{millis:03}")
    } else {
        base
    }
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex"))
}

/// Pulls the first JSON object out of free-form model output: the whole text,
/// a fenced block, or the outermost brace span.
pub fn extract_json(raw: &str) -> Result<Value, ScriptParseError> {
    let trimmed = raw.trim();
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(v);
    }

    if let Some(caps) = fenced_block().captures(trimmed) {
        if let Some(body) = caps.get(1) {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(body.as_str()) {
                return Ok(v);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if open < close => {
            Ok(serde_json::from_str(&trimmed[open..=close])?)
        }
        _ => Err(ScriptParseError::NoJson),
    }
}

/// Full path from model output to a validated [`Timeline`].
pub fn parse_script(raw: &str) -> Result<Timeline, ScriptParseError> {
    let value = extract_json(raw)?;
    let script: RawScript = serde_json::from_value(value)?;
    let timeline = script.into_timeline()?;
    timeline.validate()?;
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::SyncReason;

    const SCRIPT: &str = r#"{
        "topic": "How to Drive a Car",
        "description": "A step-by-step guide.",
        "audio_script": [
            {"timestamp": "00:00", "text": "Driving takes focus.", "speaker": "narrator_male", "speed": 1.0, "pitch": 1.0, "emotion": "neutral"},
            {"timestamp": "00:05", "text": "Adjust your mirrors.", "speaker": "narrator_female", "speed": 1.0, "pitch": 1.1, "emotion": "hopeful"}
        ],
        "visual_script": [
            {"timestamp_start": "00:00", "timestamp_end": "00:05", "prompt": "driver seat", "negative_prompt": "blurry", "style": "realistic", "guidance_scale": 11.5, "steps": 50, "seed": 123456, "width": 1024, "height": 576},
            {"timestamp_start": "00:05", "timestamp_end": "00:15", "prompt": "mirrors", "seed": 654321}
        ]
    }"#;

    #[test]
    fn parses_timestamps() {
        assert_eq!(parse_timestamp("00:15"), Some(Duration::from_secs(15)));
        assert_eq!(parse_timestamp("01:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_timestamp("7.5"), Some(Duration::from_millis(7500)));
        assert_eq!(parse_timestamp("00:01.250"), Some(Duration::from_millis(1250)));
        assert_eq!(parse_timestamp("ab:cd"), None);
        assert_eq!(parse_timestamp("1:2:3:4"), None);
    }

    #[test]
    fn rejects_out_of_range_timestamps() {
        assert_eq!(parse_timestamp("1e30"), None);
        assert_eq!(parse_timestamp("00:1e30"), None);
        assert_eq!(parse_timestamp("-3"), None);
        assert_eq!(parse_timestamp("NaN"), None);
        assert_eq!(
            parse_timestamp(&format!("{}:00:00", u64::MAX / 60)),
            None
        );
    }

    #[test]
    fn huge_numeric_timestamp_is_a_parse_error() {
        let raw = r#"{"audio_script": [
                {"timestamp": 0, "text": "a"},
                {"timestamp": 1e30, "text": "b"}
            ],
            "visual_script": []}"#;
        match parse_script(raw) {
            Err(ScriptParseError::Timestamp { track, index, .. }) => {
                assert_eq!(track, "audio");
                assert_eq!(index, 1);
            }
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }

    #[test]
    fn formats_timestamps() {
        assert_eq!(format_timestamp(Duration::from_secs(65)), "01:05");
        assert_eq!(format_timestamp(Duration::from_secs(3723)), "01:02:03");
        assert_eq!(format_timestamp(Duration::from_millis(1250)), "00:01.250");
    }

    #[test]
    fn parses_valid_script_and_fills_defaults() {
        let timeline = parse_script(SCRIPT).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.total_planned_duration(), Duration::from_secs(15));
        assert_eq!(timeline.narration[1].voice.emotion, Emotion::Neutral);
        assert_eq!(timeline.visuals[1].render.steps, 50);
        assert_eq!(timeline.visuals[1].render.width, 1024);
        assert_eq!(timeline.visuals[0].render.seed, Some(123456));
    }

    #[test]
    fn extracts_json_from_fenced_and_prose_output() {
        let fenced = format!("Here you go:\n```json\n{SCRIPT}\n```\nEnjoy");
        assert!(parse_script(&fenced).is_ok());

        let prose = format!("Sure! {SCRIPT} Let me know.");
        assert!(parse_script(&prose).is_ok());

        assert!(matches!(
            extract_json("no braces here"),
            Err(ScriptParseError::NoJson)
        ));
    }

    #[test]
    fn rejects_desynchronized_script() {
        // third visual starts at "15:00" instead of "00:15"
        let raw = r#"{
            "topic": "t", "description": "d",
            "audio_script": [
                {"timestamp": "00:00", "text": "a"},
                {"timestamp": "00:05", "text": "b"},
                {"timestamp": "00:15", "text": "c"}
            ],
            "visual_script": [
                {"timestamp_start": "00:00", "timestamp_end": "00:05", "prompt": "a"},
                {"timestamp_start": "00:05", "timestamp_end": "00:15", "prompt": "b"},
                {"timestamp_start": "15:00", "timestamp_end": "00:20", "prompt": "c"}
            ]
        }"#;
        match parse_script(raw) {
            Err(ScriptParseError::Sync(e)) => {
                assert_eq!(e.segment_index, 2);
                assert!(matches!(e.reason, SyncReason::StartMismatch { .. }));
            }
            other => panic!("expected sync error, got {other:?}"),
        }
    }

    #[test]
    fn reports_bad_timestamp_index() {
        let raw = r#"{"audio_script": [{"timestamp": "soon", "text": "a"}], "visual_script": []}"#;
        let err = parse_script(raw).unwrap_err();
        assert_eq!(err.segment_index(), Some(0));
    }

    #[test]
    fn raw_form_round_trips_through_timeline() {
        let timeline = parse_script(SCRIPT).unwrap();
        let raw = RawScript::from(&timeline);
        let json = serde_json::to_string(&raw).unwrap();
        assert_eq!(parse_script(&json).unwrap(), timeline);
    }
}
