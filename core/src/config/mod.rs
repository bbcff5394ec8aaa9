mod load;
mod types;

pub use load::{apply_env_overrides, get_forgetube_data_dir, load_default, load_file};
pub use types::{
    AppConfig, FfmpegConfig, GeminiConfig, HttpServerConfig, ImageServiceConfig, LoggingConfig,
    MediaConfig, MediaStageConfig, OutputConfig, ProviderKind, ProvidersConfig, ScriptConfig,
    SerpConfig, SubtitleConfig, TtsServiceConfig,
};
