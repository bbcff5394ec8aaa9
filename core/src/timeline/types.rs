use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const VOICE_PARAM_MIN: f32 = 0.5;
pub const VOICE_PARAM_MAX: f32 = 2.0;

/// Canonical script artifact produced by the script stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub topic: String,
    pub description: String,
    pub narration: Vec<NarrationSegment>,
    pub visuals: Vec<VisualSegment>,
}

impl Timeline {
    /// Number of aligned windows. Only meaningful once validated.
    pub fn len(&self) -> usize {
        self.narration.len()
    }

    pub fn is_empty(&self) -> bool {
        self.narration.is_empty()
    }

    /// Planned length of window `index`, taken from the visual track since it
    /// is contiguous and always covers the whole window.
    pub fn planned_window(&self, index: usize) -> Option<Duration> {
        self.visuals
            .get(index)
            .map(|v| v.end.saturating_sub(v.start))
    }

    pub fn planned_windows(&self) -> Vec<Duration> {
        (0..self.visuals.len())
            .filter_map(|i| self.planned_window(i))
            .collect()
    }

    pub fn total_planned_duration(&self) -> Duration {
        super::total_planned_duration(self)
    }

    pub fn validate(&self) -> Result<(), super::SyncError> {
        super::validate(self)
    }

    /// Wire form, as fed back to the model for refinement.
    pub fn to_raw(&self) -> super::raw::RawScript {
        super::raw::RawScript::from(self)
    }
}

/// One spoken segment. Immutable once the script stage produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationSegment {
    pub start: Duration,
    pub text: String,
    pub voice: VoiceParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub speaker: String,
    pub speed: f32,
    pub pitch: f32,
    pub emotion: Emotion,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            speaker: "default".to_string(),
            speed: 1.0,
            pitch: 1.0,
            emotion: Emotion::Neutral,
        }
    }
}

/// Delivery hint for the speech backend. Unknown values from the model fall
/// back to `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Serious,
    Dramatic,
    Mysterious,
    Informative,
    Calm,
    Guiding,
    #[default]
    #[serde(other)]
    Neutral,
}

impl Emotion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Serious => "serious",
            Self::Dramatic => "dramatic",
            Self::Mysterious => "mysterious",
            Self::Informative => "informative",
            Self::Calm => "calm",
            Self::Guiding => "guiding",
        }
    }
}

/// One visual window; a single still is held for the whole window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSegment {
    pub start: Duration,
    pub end: Duration,
    pub render: RenderParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub style: String,
    pub guidance_scale: f32,
    pub steps: u32,
    pub seed: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            style: "realistic".to_string(),
            guidance_scale: 9.0,
            steps: 50,
            seed: None,
            width: 1024,
            height: 576,
        }
    }
}
