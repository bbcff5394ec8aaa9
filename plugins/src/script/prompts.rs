//! Prompt text for the two model calls of the script stage.

use std::fmt::Write;

use forgetube_core::api::{DraftRequest, SegmentRequest};

pub const DRAFT_SYSTEM_PROMPT: &str = r#"You write scripts for short educational, marketing and entertainment videos.
Produce an outline and a first draft: the narration to be spoken and a general description of what is on screen.
On-screen descriptions are single still images. Never describe animation, motion, transitions or video effects.
Do not add timestamps, voice settings or image generation parameters; a later step adds them.
Answer with JSON only:
{
  "topic": "Topic name",
  "overall_narrative": "One paragraph summary of the whole video",
  "key_sections": [
    {
      "section_title": "Title of the section",
      "narration_text": "Everything spoken in this section",
      "visual_description": "What the still image for this section shows"
    }
  ]
}"#;

pub const SEGMENT_SYSTEM_PROMPT: &str = r#"You split a video script draft into timestamped segments for narration and images.
Rules:
1. Cut narration_text and visual_description into segments of roughly 5 to 15 seconds.
2. Timestamps are "MM:SS" strings. audio_script[i].timestamp must equal visual_script[i].timestamp_start.
3. audio_script and visual_script have exactly the same number of entries.
4. visual_script windows are contiguous: the first starts at "00:00" and each timestamp_end equals the next timestamp_start.
5. Every visual prompt describes one detailed still image suitable for Stable Diffusion, with a matching negative_prompt.
6. Pick speaker, speed (0.5-2.0), pitch (0.5-2.0) and emotion for every narration segment.
7. Keep style consistent across consecutive images and vary the seed to move the story along.
Answer with JSON only:
{
  "topic": "Topic name",
  "description": "One sentence description of the video",
  "audio_script": [
    {"timestamp": "00:00", "text": "Narration", "speaker": "default|narrator_male|narrator_female",
     "speed": 1.0, "pitch": 1.0, "emotion": "neutral|serious|dramatic|mysterious|informative|calm|guiding"}
  ],
  "visual_script": [
    {"timestamp_start": "00:00", "timestamp_end": "00:05", "prompt": "Detailed image description",
     "negative_prompt": "blurry, distorted faces, abstract shapes", "style": "realistic|cinematic|hyperrealistic|fantasy|scientific",
     "guidance_scale": 7.5, "steps": 50, "seed": 123456, "width": 1024, "height": 576}
  ]
}"#;

pub fn draft_prompt(request: &DraftRequest) -> String {
    let key_points = if request.key_points.is_empty() {
        "Comprehensive coverage".to_string()
    } else {
        request.key_points.join(", ")
    };
    let mut out = format!(
        "Write an initial outline for a {}-second video about: {}.\nKey points: {}\n",
        request.duration.as_secs(),
        request.topic,
        key_points
    );
    if !request.web_context.is_empty() {
        let _ = writeln!(out, "Additional context: {}", request.web_context);
    }
    out.push_str("Focus on the narrative and the sections. No timestamps or technical parameters yet.");
    out
}

pub fn segment_prompt(request: &SegmentRequest) -> String {
    let mut out = String::new();
    match &request.feedback {
        Some(feedback) => {
            let _ = write!(
                out,
                "Refine this script based on the feedback.\nExisting script:\n{}\nFeedback: {}\n",
                request.draft, feedback
            );
        }
        None => {
            let _ = write!(
                out,
                "Here is the script draft:\n{}\nSegment it into timestamped narration and image windows with all parameters.\n",
                request.draft
            );
        }
    }
    let _ = writeln!(
        out,
        "The total duration should be about {} seconds.",
        request.duration.as_secs()
    );
    if !request.guidance.is_empty() {
        out.push_str("Earlier answers were rejected. Fix these problems:\n");
        for (i, problem) in request.guidance.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, problem);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn draft_prompt_defaults_key_points() {
        let prompt = draft_prompt(&DraftRequest {
            topic: "Tides".into(),
            duration: Duration::from_secs(60),
            key_points: vec![],
            web_context: String::new(),
        });
        assert!(prompt.contains("60-second video about: Tides"));
        assert!(prompt.contains("Comprehensive coverage"));
        assert!(!prompt.contains("Additional context"));
    }

    #[test]
    fn draft_prompt_includes_context_and_points() {
        let prompt = draft_prompt(&DraftRequest {
            topic: "Tides".into(),
            duration: Duration::from_secs(90),
            key_points: vec!["moon".into(), "sun".into()],
            web_context: "The moon pulls the sea.".into(),
        });
        assert!(prompt.contains("Key points: moon, sun"));
        assert!(prompt.contains("Additional context: The moon pulls the sea."));
    }

    #[test]
    fn segment_prompt_lists_guidance_and_feedback() {
        let prompt = segment_prompt(&SegmentRequest {
            draft: "{}".into(),
            duration: Duration::from_secs(30),
            feedback: Some("shorter intro".into()),
            guidance: vec!["gap at segment 2".into(), "lengths differ".into()],
        });
        assert!(prompt.starts_with("Refine this script"));
        assert!(prompt.contains("Feedback: shorter intro"));
        assert!(prompt.contains("1. gap at segment 2\n2. lengths differ"));
        assert!(prompt.contains("about 30 seconds"));
    }
}
