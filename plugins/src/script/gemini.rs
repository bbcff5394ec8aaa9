use serde_json::{json, Value};

use crate::http_error::{client, endpoint, parse_json_response, ProviderHttpError};

const PROVIDER: &str = "gemini";

/// `generateContent` REST client. The API key travels per call so one client
/// serves every task.
pub struct GeminiClient {
    http: reqwest::Client,
    url_generate: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: client(timeout_ms)?,
            url_generate: endpoint(base_url, &format!("models/{}:generateContent", model)),
        })
    }

    /// Returns the text of the first candidate, parts concatenated.
    pub async fn generate(
        &self,
        system_prompt: &str,
        prompt: &str,
        api_key: &str,
    ) -> anyhow::Result<String> {
        let url = &self.url_generate;
        tracing::debug!(
            target: "forgetube.provider",
            stage = "gemini.generate.in",
            url = %url,
            prompt_len = prompt.len()
        );
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let resp = self
            .http
            .post(url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderHttpError::from_reqwest(PROVIDER, err, url))?;
        let status = resp.status();
        let v = parse_json_response(PROVIDER, resp).await?;
        let text = candidate_text(&v).ok_or_else(|| {
            let reason = v
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .map(|r| format!("prompt blocked: {r}"))
                .unwrap_or_else(|| "response has no candidate text".to_string());
            ProviderHttpError::shape_error(PROVIDER, url, reason)
        })?;
        tracing::debug!(
            target: "forgetube.provider",
            stage = "gemini.generate.out",
            status = %status,
            text_len = text.len()
        );
        Ok(text)
    }
}

fn candidate_text(v: &Value) -> Option<String> {
    let parts = v.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
