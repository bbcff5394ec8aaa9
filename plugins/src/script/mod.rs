mod backend;
mod gemini;
mod prompts;
mod serp;

pub use backend::HttpScriptBackend;
pub use gemini::GeminiClient;
pub use prompts::{draft_prompt, segment_prompt, DRAFT_SYSTEM_PROMPT, SEGMENT_SYSTEM_PROMPT};
pub use serp::SerpSearchClient;
