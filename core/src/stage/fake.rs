//! In-process stand-ins for the external generators. Used by tests and by
//! dry runs of the binary.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::{
    DraftRequest, ImageRenderer, RenderRequest, ScriptBackend, SegmentRequest, SpeechRequest,
    SpeechSynthesizer, SynthesizedClip,
};
use crate::assembly::{Assembler, AssemblyJob};
use crate::error::{AssemblyError, RenderError, SynthesisError};
use crate::state::Credentials;

/// A valid raw script with `segments` windows of `secs` seconds each.
/// Visual prompts are `scene {i}`, narration texts `line {i}`.
pub fn sample_script(segments: usize, secs: u64) -> String {
    let audio: Vec<_> = (0..segments)
        .map(|i| {
            json!({
                "timestamp": i as u64 * secs,
                "text": format!("line {i}"),
                "speaker": "narrator_female",
                "speed": 1.0,
                "pitch": 1.0,
                "emotion": "informative",
            })
        })
        .collect();
    let visual: Vec<_> = (0..segments)
        .map(|i| {
            json!({
                "timestamp_start": i as u64 * secs,
                "timestamp_end": (i as u64 + 1) * secs,
                "prompt": format!("scene {i}"),
                "negative_prompt": "blurry",
                "style": "realistic",
                "guidance_scale": 7.5,
                "steps": 30,
                "seed": 1000 + i,
                "width": 64,
                "height": 36,
            })
        })
        .collect();
    json!({
        "topic": "Sample",
        "description": "Sample video",
        "audio_script": audio,
        "visual_script": visual,
    })
    .to_string()
}

/// Replays scripted segmentation outputs; the last one repeats once the
/// queue is drained.
pub struct FakeScriptBackend {
    outputs: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    fail_search: bool,
    fail_draft: bool,
    drafts: Mutex<Vec<DraftRequest>>,
    segments: Mutex<Vec<SegmentRequest>>,
}

impl FakeScriptBackend {
    pub fn new(outputs: Vec<String>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            last: Mutex::new(None),
            fail_search: false,
            fail_draft: false,
            drafts: Mutex::new(Vec::new()),
            segments: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_draft(mut self) -> Self {
        self.fail_draft = true;
        self
    }

    pub fn segment_calls(&self) -> usize {
        self.segments.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn segment_requests(&self) -> Vec<SegmentRequest> {
        self.segments.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn draft_requests(&self) -> Vec<DraftRequest> {
        self.drafts.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn next_output(&self) -> Option<String> {
        let mut outputs = self.outputs.lock().ok()?;
        let mut last = self.last.lock().ok()?;
        if let Some(next) = outputs.pop_front() {
            *last = Some(next);
        }
        last.clone()
    }
}

#[async_trait]
impl ScriptBackend for FakeScriptBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, _credentials: &Credentials) -> anyhow::Result<Vec<String>> {
        if self.fail_search {
            return Err(anyhow!("search unavailable"));
        }
        Ok(vec![format!("{query} is a well studied subject.")])
    }

    async fn generate_draft(
        &self,
        request: &DraftRequest,
        _credentials: &Credentials,
    ) -> anyhow::Result<String> {
        if let Ok(mut drafts) = self.drafts.lock() {
            drafts.push(request.clone());
        }
        if self.fail_draft {
            return Err(anyhow!("draft model unavailable"));
        }
        Ok(json!({
            "topic": request.topic,
            "overall_narrative": format!("A short film about {}", request.topic),
            "key_sections": request.key_points,
        })
        .to_string())
    }

    async fn segment(
        &self,
        request: &SegmentRequest,
        _credentials: &Credentials,
    ) -> anyhow::Result<String> {
        if let Ok(mut segments) = self.segments.lock() {
            segments.push(request.clone());
        }
        self.next_output()
            .ok_or_else(|| anyhow!("no scripted output left"))
    }
}

/// Returns a tiny fake PNG per prompt.
#[derive(Default)]
pub struct FakeImageRenderer {
    fail_prompts: HashSet<String>,
    stall: bool,
    calls: AtomicUsize,
}

impl FakeImageRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every render of these prompts fails.
    pub fn failing_on<I, S>(mut self, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_prompts = prompts.into_iter().map(Into::into).collect();
        self
    }

    /// Renders never finish.
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageRenderer for FakeImageRenderer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail_prompts.contains(&request.prompt) {
            return Err(RenderError::new(format!(
                "diffusion backend rejected '{}'",
                request.prompt
            )));
        }
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(request.prompt.as_bytes());
        Ok(bytes)
    }
}

/// Clip length is `per_word` times the word count of the text.
pub struct FakeSpeechSynthesizer {
    per_word: Duration,
    fail_texts: HashSet<String>,
}

impl Default for FakeSpeechSynthesizer {
    fn default() -> Self {
        Self {
            per_word: Duration::from_millis(400),
            fail_texts: HashSet::new(),
        }
    }
}

impl FakeSpeechSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn per_word(mut self, per_word: Duration) -> Self {
        self.per_word = per_word;
        self
    }

    pub fn failing_on<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_texts = texts.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeechSynthesizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<SynthesizedClip, SynthesisError> {
        if self.fail_texts.contains(&request.text) {
            return Err(SynthesisError::new("voice backend unavailable"));
        }
        let words = request.text.split_whitespace().count() as u32;
        Ok(SynthesizedClip {
            data: request.text.as_bytes().to_vec(),
            duration: self.per_word * words,
        })
    }
}

/// Writes a JSON manifest of the reconciled windows instead of a video.
#[derive(Default)]
pub struct FakeAssembler {
    fail: bool,
}

impl FakeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Assembler for FakeAssembler {
    fn name(&self) -> &str {
        "fake"
    }

    async fn assemble(&self, job: &AssemblyJob) -> Result<PathBuf, AssemblyError> {
        if self.fail {
            return Err(AssemblyError::Encoder("encoder exited with status 1".into()));
        }
        let windows = job.windows()?;
        let manifest = json!({
            "windows": windows,
            "cues": job.cues.len(),
            "subtitles": job.subtitles_path,
        });
        let body = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| AssemblyError::Encoder(e.to_string()))?;
        tokio::fs::write(&job.output_path, body).await?;
        Ok(job.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::parse_script;

    #[test]
    fn sample_script_is_valid() {
        let timeline = parse_script(&sample_script(4, 5)).unwrap();
        assert_eq!(timeline.len(), 4);
        assert_eq!(timeline.total_planned_duration(), Duration::from_secs(20));
    }
}
