use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub http_server: HttpServerConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub subtitles: SubtitleConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to `forgetube.log` under `directory`.
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "forgetube_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Directory for log files; `~/.forgetube/logs` when unset.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Per-task artifacts live under `<root_dir>/<task_id>/`.
    #[serde(default = "default_output_root")]
    pub root_dir: String,
}

fn default_output_root() -> String {
    "results".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: default_output_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: u64,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Extra segmentation calls after the first invalid script.
    #[serde(default = "default_segmentation_retries")]
    pub segmentation_retries: u32,
}

fn default_duration_secs() -> u64 {
    60
}

fn default_max_duration_secs() -> u64 {
    300
}

fn default_segmentation_retries() -> u32 {
    2
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration_secs(),
            max_duration_secs: default_max_duration_secs(),
            segmentation_retries: default_segmentation_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStageConfig {
    #[serde(default = "default_media_retries")]
    pub retries: u32,
    pub concurrency: usize,
}

fn default_media_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_image_stage")]
    pub image: MediaStageConfig,
    #[serde(default = "default_audio_stage")]
    pub audio: MediaStageConfig,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_image_stage() -> MediaStageConfig {
    MediaStageConfig {
        retries: default_media_retries(),
        concurrency: 2,
    }
}

fn default_audio_stage() -> MediaStageConfig {
    MediaStageConfig {
        retries: default_media_retries(),
        concurrency: 4,
    }
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8_000
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image: default_image_stage(),
            audio: default_audio_stage(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    #[serde(default = "default_chunk_size_secs")]
    pub chunk_size_secs: f64,
}

fn default_chunk_size_secs() -> f64 {
    10.0
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            chunk_size_secs: default_chunk_size_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Http,
    /// In-process fakes; no network, no ffmpeg.
    Fake,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub serp: SerpConfig,
    #[serde(default)]
    pub image: ImageServiceConfig,
    #[serde(default)]
    pub tts: TtsServiceConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

fn default_timeout_ms() -> u64 {
    120_000
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Used when a submission carries no key of its own.
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_url(),
            model: default_gemini_model(),
            timeout_ms: default_timeout_ms(),
            api_key: String::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SerpConfig {
    #[serde(default = "default_serp_url")]
    pub base_url: String,
    #[serde(default = "default_serp_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

fn default_serp_url() -> String {
    "https://serpapi.com".to_string()
}

fn default_serp_timeout_ms() -> u64 {
    15_000
}

impl Default for SerpConfig {
    fn default() -> Self {
        Self {
            base_url: default_serp_url(),
            timeout_ms: default_serp_timeout_ms(),
            api_key: String::new(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for SerpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

fn redacted(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageServiceConfig {
    #[serde(default = "default_image_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_image_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_image_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsServiceConfig {
    #[serde(default = "default_tts_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tts_url() -> String {
    "http://127.0.0.1:7861".to_string()
}

impl Default for TtsServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg_bin")]
    pub bin: String,
    /// Font file for burned-in subtitles; libass default when unset.
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_fps() -> u32 {
    24
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            bin: default_ffmpeg_bin(),
            font_path: None,
            fps: default_fps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.output.root_dir, "results");
        assert_eq!(cfg.script.default_duration_secs, 60);
        assert_eq!(cfg.script.max_duration_secs, 300);
        assert_eq!(cfg.subtitles.chunk_size_secs, 10.0);
        assert_eq!(cfg.media.image.concurrency, 2);
        assert_eq!(cfg.providers.kind, ProviderKind::Http);
    }

    #[test]
    fn test_partial_sections() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [media.image]
            concurrency = 1

            [providers]
            kind = "fake"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.media.image.concurrency, 1);
        assert_eq!(cfg.media.image.retries, 2);
        assert_eq!(cfg.media.audio.concurrency, 4);
        assert_eq!(cfg.providers.kind, ProviderKind::Fake);
    }
}
