use anyhow::bail;
use async_trait::async_trait;

use forgetube_core::api::{
    Credentials, DraftRequest, GeminiConfig, ScriptBackend, SegmentRequest, SerpConfig,
};

use super::gemini::GeminiClient;
use super::prompts::{draft_prompt, segment_prompt, DRAFT_SYSTEM_PROMPT, SEGMENT_SYSTEM_PROMPT};
use super::serp::SerpSearchClient;

/// Gemini for both model calls, SerpAPI for web context.
pub struct HttpScriptBackend {
    llm: GeminiClient,
    search: SerpSearchClient,
}

impl HttpScriptBackend {
    pub fn new(gemini: &GeminiConfig, serp: &SerpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            llm: GeminiClient::new(&gemini.base_url, &gemini.model, gemini.timeout_ms)?,
            search: SerpSearchClient::new(&serp.base_url, serp.timeout_ms)?,
        })
    }
}

fn require(key: &str, what: &str) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        bail!("{what} api key is missing");
    }
    Ok(())
}

#[async_trait]
impl ScriptBackend for HttpScriptBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn search(&self, query: &str, credentials: &Credentials) -> anyhow::Result<Vec<String>> {
        require(credentials.search_api_key(), "search")?;
        self.search
            .snippets(query, credentials.search_api_key())
            .await
    }

    async fn generate_draft(
        &self,
        request: &DraftRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<String> {
        require(credentials.llm_api_key(), "llm")?;
        self.llm
            .generate(
                DRAFT_SYSTEM_PROMPT,
                &draft_prompt(request),
                credentials.llm_api_key(),
            )
            .await
    }

    async fn segment(
        &self,
        request: &SegmentRequest,
        credentials: &Credentials,
    ) -> anyhow::Result<String> {
        require(credentials.llm_api_key(), "llm")?;
        self.llm
            .generate(
                SEGMENT_SYSTEM_PROMPT,
                &segment_prompt(request),
                credentials.llm_api_key(),
            )
            .await
    }
}
