//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `forgetube_core::api` instead of reaching into internal modules.

pub use crate::assembly::{measured_durations, reconcile, Assembler, AssemblyJob, ClipWindow};
pub use crate::config::{
    apply_env_overrides, load_default, load_file, AppConfig, FfmpegConfig, GeminiConfig,
    HttpServerConfig, ImageServiceConfig, LoggingConfig, ProviderKind, ProvidersConfig, SerpConfig,
    TtsServiceConfig,
};
pub use crate::error::{
    AssemblyError, CliError, ErrorKind, OrchestratorError, RenderError, StageError, StoreError,
    SynthesisError, TaskError,
};
pub use crate::orchestrator::{
    parse_key_points, parse_task_id, ArtifactLayout, Orchestrator, PipelineSettings, Stages,
    SubmitRequest,
};
pub use crate::stage::{
    AudioArtifact, ClipSource, DraftRequest, ImageArtifact, ImageRenderer, RenderRequest,
    ScriptBackend, SegmentRequest, SpeechRequest, SpeechSynthesizer, SynthesizedClip,
};
pub use crate::state::{
    CancelToken, Credentials, MediaKind, StoreStats, TaskEvent, TaskId, TaskState, TaskStatus,
    TaskStore,
};
pub use crate::subtitle::{chunk_cues, render_srt, SubtitleCue};
pub use crate::timeline::{
    extract_json, format_timestamp, parse_script, total_planned_duration, validate, RawScript,
    ScriptParseError, SyncError, SyncReason, Timeline,
};
