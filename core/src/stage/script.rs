//! Draft, segment, validate. Segmentation is retried with the previous
//! failure fed back as guidance until the timeline validates.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{DraftRequest, ScriptBackend, SegmentRequest};
use crate::error::{ScriptAttemptError, StageError};
use crate::state::{CancelToken, Credentials};
use crate::timeline::{extract_json, parse_script, Timeline};

/// Snippets kept from the enrichment search.
pub const WEB_CONTEXT_SNIPPETS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    pub topic: String,
    pub duration: Duration,
    pub key_points: Vec<String>,
}

pub struct ScriptStage {
    backend: Arc<dyn ScriptBackend>,
    retries: u32,
}

impl ScriptStage {
    pub fn new(backend: Arc<dyn ScriptBackend>, retries: u32) -> Self {
        Self { backend, retries }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn generate(
        &self,
        request: &ScriptRequest,
        credentials: &Credentials,
        cancel: &CancelToken,
    ) -> Result<Timeline, StageError> {
        let web_context = self.web_context(&request.topic, credentials).await;
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let draft_request = DraftRequest {
            topic: request.topic.clone(),
            duration: request.duration,
            key_points: request.key_points.clone(),
            web_context: web_context.clone(),
        };
        let raw_draft = self
            .backend
            .generate_draft(&draft_request, credentials)
            .await
            .map_err(|e| StageError::Exhausted {
                stage: "script.draft",
                attempts: 1,
                last: ScriptAttemptError::Backend(format!("{e:#}")),
            })?;
        let draft = attach_context(&raw_draft, &web_context);

        let mut timeline = self
            .segment_until_valid(draft, request.duration, None, credentials, cancel)
            .await?;
        if timeline.topic.trim().is_empty() {
            timeline.topic = request.topic.clone();
        }
        Ok(timeline)
    }

    /// Resegments `current` with reviewer feedback. Produces a new timeline;
    /// `current` is never modified.
    pub async fn refine(
        &self,
        current: &Timeline,
        feedback: &str,
        duration: Duration,
        credentials: &Credentials,
        cancel: &CancelToken,
    ) -> Result<Timeline, StageError> {
        let draft = serde_json::to_string_pretty(&current.to_raw()).map_err(|e| {
            StageError::Exhausted {
                stage: "script.refine",
                attempts: 0,
                last: ScriptAttemptError::Parse(e.into()),
            }
        })?;
        let mut timeline = self
            .segment_until_valid(
                draft,
                duration,
                Some(feedback.to_string()),
                credentials,
                cancel,
            )
            .await?;
        if timeline.topic.trim().is_empty() {
            timeline.topic = current.topic.clone();
        }
        Ok(timeline)
    }

    async fn web_context(&self, topic: &str, credentials: &Credentials) -> String {
        match self.backend.search(topic, credentials).await {
            Ok(snippets) => snippets
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(WEB_CONTEXT_SNIPPETS)
                .collect::<Vec<_>>()
                .join(" "),
            Err(e) => {
                tracing::warn!(
                    target: "forgetube.script",
                    backend = self.backend.name(),
                    error = %e,
                    "web search failed, continuing without context"
                );
                String::new()
            }
        }
    }

    async fn segment_until_valid(
        &self,
        draft: String,
        duration: Duration,
        feedback: Option<String>,
        credentials: &Credentials,
        cancel: &CancelToken,
    ) -> Result<Timeline, StageError> {
        let stage = if feedback.is_some() {
            "script.refine"
        } else {
            "script.segment"
        };
        let max_attempts = self.retries.saturating_add(1);
        let mut request = SegmentRequest {
            draft,
            duration,
            feedback,
            guidance: Vec::new(),
        };
        let mut last = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            let outcome = match self.backend.segment(&request, credentials).await {
                Ok(raw) => parse_script(&raw).map_err(ScriptAttemptError::from),
                Err(e) => Err(ScriptAttemptError::Backend(format!("{e:#}"))),
            };
            match outcome {
                Ok(timeline) => {
                    tracing::info!(
                        target: "forgetube.script",
                        stage,
                        attempt,
                        segments = timeline.len(),
                        "script validated"
                    );
                    return Ok(timeline);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "forgetube.script",
                        stage = %format!("{stage}.retry"),
                        attempt,
                        max_attempts,
                        segment_index = ?e.segment_index(),
                        error = %e,
                        "segmented script rejected"
                    );
                    request.guidance.push(guidance_for(&e));
                    last = Some(e);
                }
            }
        }

        Err(StageError::Exhausted {
            stage,
            attempts: max_attempts,
            last: last.unwrap_or_else(|| ScriptAttemptError::Backend("no attempt made".into())),
        })
    }
}

/// Adds the search context to a JSON draft; non-JSON drafts pass through as
/// text.
fn attach_context(raw_draft: &str, web_context: &str) -> String {
    match extract_json(raw_draft) {
        Ok(Value::Object(mut map)) => {
            map.insert(
                "additional_context".to_string(),
                Value::String(web_context.to_string()),
            );
            Value::Object(map).to_string()
        }
        _ => raw_draft.trim().to_string(),
    }
}

fn guidance_for(error: &ScriptAttemptError) -> String {
    match error {
        ScriptAttemptError::Backend(_) => {
            "The previous request failed. Return only the JSON script.".to_string()
        }
        ScriptAttemptError::Parse(e) => format!(
            "The previous output was rejected: {e}. Keep audio_script and visual_script the \
             same length with identical start timestamps, and make each visual segment end \
             where the next one starts."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stage::fake::{sample_script, FakeScriptBackend};

    fn request() -> ScriptRequest {
        ScriptRequest {
            topic: "Tides".into(),
            duration: Duration::from_secs(30),
            key_points: vec!["moon".into()],
        }
    }

    fn creds() -> Credentials {
        Credentials::new("llm", "serp")
    }

    #[tokio::test]
    async fn test_generates_valid_timeline() {
        let backend = Arc::new(FakeScriptBackend::new(vec![sample_script(3, 5)]));
        let stage = ScriptStage::new(backend.clone(), 2);
        let timeline = stage
            .generate(&request(), &creds(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(backend.segment_calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_with_guidance_until_valid() {
        let backend = Arc::new(FakeScriptBackend::new(vec![
            "not json at all".to_string(),
            sample_script(2, 5),
        ]));
        let stage = ScriptStage::new(backend.clone(), 2);
        stage
            .generate(&request(), &creds(), &CancelToken::new())
            .await
            .unwrap();

        let requests = backend.segment_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].guidance.is_empty());
        assert_eq!(requests[1].guidance.len(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_last_sync_error() {
        let desync = r#"{"topic":"Tides","audio_script":[{"timestamp":"00:00","text":"a"}],
            "visual_script":[]}"#;
        let backend = Arc::new(FakeScriptBackend::new(vec![desync.to_string(); 3]));
        let stage = ScriptStage::new(backend.clone(), 2);
        let err = stage
            .generate(&request(), &creds(), &CancelToken::new())
            .await
            .unwrap_err();

        match err {
            StageError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.kind(), ErrorKind::Validation);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(backend.segment_calls(), 3);
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_empty_context() {
        let backend = Arc::new(FakeScriptBackend::new(vec![sample_script(2, 5)]).failing_search());
        let stage = ScriptStage::new(backend.clone(), 0);
        stage
            .generate(&request(), &creds(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(backend.draft_requests()[0].web_context, "");
    }

    #[tokio::test]
    async fn test_empty_topic_is_forced_to_request() {
        let script = sample_script(2, 5).replace("\"topic\":\"Sample\"", "\"topic\":\"\"");
        let backend = Arc::new(FakeScriptBackend::new(vec![script]));
        let stage = ScriptStage::new(backend, 0);
        let timeline = stage
            .generate(&request(), &creds(), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(timeline.topic, "Tides");
    }

    #[tokio::test]
    async fn test_refine_passes_feedback_and_existing_script() {
        let backend = Arc::new(FakeScriptBackend::new(vec![
            sample_script(2, 5),
            sample_script(4, 5),
        ]));
        let stage = ScriptStage::new(backend.clone(), 0);
        let first = stage
            .generate(&request(), &creds(), &CancelToken::new())
            .await
            .unwrap();
        let refined = stage
            .refine(
                &first,
                "more detail",
                Duration::from_secs(20),
                &creds(),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(refined.len(), 4);
        let last = backend.segment_requests().pop().unwrap();
        assert_eq!(last.feedback.as_deref(), Some("more detail"));
        assert!(last.draft.contains("audio_script"));
    }

    #[test]
    fn test_attach_context_to_json_draft() {
        let out = attach_context("```json\n{\"topic\":\"Tides\"}\n```", "moon pulls water");
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["additional_context"], "moon pulls water");
        assert_eq!(attach_context("  plain outline ", "ctx"), "plain outline");
    }
}
