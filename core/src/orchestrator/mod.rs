//! Task orchestration: submission, status reads, cancellation, and script
//! review, on top of one pipeline run per task.

mod layout;
mod pipeline;

pub use layout::{ArtifactLayout, TaskPaths};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::assembly::Assembler;
use crate::config::AppConfig;
use crate::error::OrchestratorError;
use crate::stage::{
    ImageRenderer, RetryPolicy, ScriptBackend, SegmentPolicy, SpeechSynthesizer,
};
use crate::state::{Credentials, Task, TaskEvent, TaskId, TaskState, TaskStatus, TaskStore};
use crate::timeline::Timeline;

/// The external generators a pipeline run talks to.
#[derive(Clone)]
pub struct Stages {
    pub script: Arc<dyn ScriptBackend>,
    pub images: Arc<dyn ImageRenderer>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub assembler: Arc<dyn Assembler>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub script_retries: u32,
    pub image: SegmentPolicy,
    pub audio: SegmentPolicy,
    pub chunk_size: Duration,
    pub default_duration: Duration,
    pub max_duration: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(cfg: &AppConfig) -> Self {
        let retry = |retries| RetryPolicy {
            retries,
            base_delay_ms: cfg.media.retry_base_delay_ms,
            max_delay_ms: cfg.media.retry_max_delay_ms,
        };
        Self {
            script_retries: cfg.script.segmentation_retries,
            image: SegmentPolicy {
                retry: retry(cfg.media.image.retries),
                concurrency: cfg.media.image.concurrency.max(1),
            },
            audio: SegmentPolicy {
                retry: retry(cfg.media.audio.retries),
                concurrency: cfg.media.audio.concurrency.max(1),
            },
            chunk_size: Duration::try_from_secs_f64(cfg.subtitles.chunk_size_secs.max(0.001))
                .unwrap_or(Duration::from_secs(10)),
            default_duration: Duration::from_secs(cfg.script.default_duration_secs),
            max_duration: Duration::from_secs(cfg.script.max_duration_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub topic: String,
    /// Falls back to the configured default when `None`.
    pub duration: Option<Duration>,
    pub key_points: Vec<String>,
    pub credentials: Credentials,
    /// Pause at `ScriptReady` until `dispatch` is called.
    pub review: bool,
}

/// Splits comma separated key points, dropping blanks.
pub fn parse_key_points(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) enum ReviewCommand {
    Refine {
        feedback: String,
        reply: oneshot::Sender<Result<u32, String>>,
    },
    Dispatch,
}

struct RunHandle {
    commands: mpsc::Sender<ReviewCommand>,
    join: Option<JoinHandle<()>>,
}

struct OrchestratorInner {
    store: TaskStore,
    stages: Stages,
    settings: PipelineSettings,
    layout: ArtifactLayout,
    runs: Mutex<HashMap<TaskId, RunHandle>>,
}

/// Cloneable handle; all clones share one task store.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn new(
        store: TaskStore,
        stages: Stages,
        settings: PipelineSettings,
        layout: ArtifactLayout,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                store,
                stages,
                settings,
                layout,
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn from_config(cfg: &AppConfig, stages: Stages) -> Self {
        Self::new(
            TaskStore::new(),
            stages,
            PipelineSettings::from(cfg),
            ArtifactLayout::new(&cfg.output.root_dir),
        )
    }

    /// Recovers from poisoning; the table only holds handles.
    fn runs(&self) -> MutexGuard<'_, HashMap<TaskId, RunHandle>> {
        self.inner
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &TaskStore {
        &self.inner.store
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.inner.layout
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.store.subscribe()
    }

    /// Validates the request, stores a `Queued` task and starts its pipeline
    /// run in the background.
    pub async fn submit(&self, request: SubmitRequest) -> Result<TaskId, OrchestratorError> {
        let settings = &self.inner.settings;
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(OrchestratorError::InvalidRequest("topic is required".into()));
        }
        let duration = request.duration.unwrap_or(settings.default_duration);
        if duration.is_zero() || duration > settings.max_duration {
            return Err(OrchestratorError::InvalidRequest(format!(
                "duration must be between 1 and {} seconds",
                settings.max_duration.as_secs()
            )));
        }
        if !request.credentials.is_complete() {
            return Err(OrchestratorError::InvalidRequest(
                "both the LLM and the search API keys are required".into(),
            ));
        }

        let key_points = request
            .key_points
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let task = Task::new(topic, duration, key_points, request.credentials)
            .with_review(request.review);
        let id = self.inner.store.insert(task).await?;

        let (tx, rx) = mpsc::channel(8);
        let ctx = pipeline::RunContext {
            id,
            store: self.inner.store.clone(),
            stages: self.inner.stages.clone(),
            settings: self.inner.settings.clone(),
            layout: self.inner.layout.clone(),
        };
        let join = tokio::spawn(pipeline::supervise(ctx, rx));
        let handle = RunHandle {
            commands: tx,
            join: Some(join),
        };
        self.runs().insert(id, handle);

        tracing::info!(
            target: "forgetube.orchestrator",
            task_id = %id,
            duration_secs = duration.as_secs(),
            review = request.review,
            "task submitted"
        );
        Ok(id)
    }

    pub async fn get_status(&self, id: TaskId) -> Result<TaskStatus, OrchestratorError> {
        Ok(self.inner.store.status(id).await?)
    }

    pub async fn list(&self) -> Vec<TaskStatus> {
        self.inner.store.list().await
    }

    /// Current script of a task, if the script stage has produced one.
    pub async fn script(&self, id: TaskId) -> Result<Option<Timeline>, OrchestratorError> {
        Ok(self.inner.store.task(id).await?.timeline)
    }

    /// Cancels a live task. A finished task is left as is; its state is
    /// returned either way.
    pub async fn request_cancel(&self, id: TaskId) -> Result<TaskState, OrchestratorError> {
        let state = self.inner.store.cancel(id).await?;
        tracing::info!(
            target: "forgetube.orchestrator",
            task_id = %id,
            state = %state,
            "cancel requested"
        );
        Ok(state)
    }

    /// Replaces the script of a task waiting for review with a refined one.
    /// On failure the previous script stays in place.
    pub async fn refine(
        &self,
        id: TaskId,
        feedback: impl Into<String>,
    ) -> Result<TaskStatus, OrchestratorError> {
        let feedback = feedback.into();
        if feedback.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest("feedback is required".into()));
        }
        let commands = self.review_channel(id).await?;
        let (reply, rx) = oneshot::channel();
        commands
            .send(ReviewCommand::Refine { feedback, reply })
            .await
            .map_err(|_| OrchestratorError::Refinement("pipeline run has ended".into()))?;
        match rx.await {
            Ok(Ok(_revision)) => self.get_status(id).await,
            Ok(Err(message)) => Err(OrchestratorError::Refinement(message)),
            Err(_) => Err(OrchestratorError::Refinement("pipeline run has ended".into())),
        }
    }

    /// Releases a task waiting for review into media generation.
    pub async fn dispatch(&self, id: TaskId) -> Result<(), OrchestratorError> {
        let commands = self.review_channel(id).await?;
        commands
            .send(ReviewCommand::Dispatch)
            .await
            .map_err(|_| OrchestratorError::Refinement("pipeline run has ended".into()))
    }

    async fn review_channel(
        &self,
        id: TaskId,
    ) -> Result<mpsc::Sender<ReviewCommand>, OrchestratorError> {
        let task = self.inner.store.task(id).await?;
        if !task.review || task.state != TaskState::ScriptReady {
            return Err(OrchestratorError::NotAwaitingReview {
                task_id: id,
                state: task.state,
            });
        }
        self.runs()
            .get(&id)
            .map(|r| r.commands.clone())
            .ok_or(OrchestratorError::NotAwaitingReview {
                task_id: id,
                state: task.state,
            })
    }

    /// Waits for the task's pipeline run to finish and returns the final
    /// status.
    pub async fn join(&self, id: TaskId) -> Result<TaskStatus, OrchestratorError> {
        let handle = self.runs().get_mut(&id).and_then(|r| r.join.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(
                    target: "forgetube.orchestrator",
                    task_id = %id,
                    error = %e,
                    "pipeline run aborted"
                );
            }
        }
        self.get_status(id).await
    }

    /// Waits for every pipeline run started so far.
    pub async fn join_all(&self) {
        let ids: Vec<TaskId> = self.runs().keys().copied().collect();
        for id in ids {
            let _ = self.join(id).await;
        }
    }
}

/// Parses a caller supplied id; malformed ids are reported as unknown.
pub fn parse_task_id(text: &str) -> Result<TaskId, OrchestratorError> {
    text.trim()
        .parse()
        .map_err(|_| OrchestratorError::NotFound(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_points_drops_blanks() {
        assert_eq!(
            parse_key_points(" moon, ,gravity ,,tides "),
            vec!["moon", "gravity", "tides"]
        );
        assert!(parse_key_points("").is_empty());
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.chunk_size, Duration::from_secs(10));
        assert_eq!(settings.script_retries, 2);
        assert_eq!(settings.image.retry.max_attempts(), 3);
        assert_eq!(settings.max_duration, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_poisoned_run_table_still_tracks_runs() {
        use crate::stage::fake::{
            sample_script, FakeAssembler, FakeImageRenderer, FakeScriptBackend,
            FakeSpeechSynthesizer,
        };

        let root = tempfile::tempdir().unwrap();
        let stages = Stages {
            script: Arc::new(FakeScriptBackend::new(vec![sample_script(2, 5)])),
            images: Arc::new(FakeImageRenderer::new()),
            speech: Arc::new(FakeSpeechSynthesizer::new()),
            assembler: Arc::new(FakeAssembler::new()),
        };
        let orchestrator = Orchestrator::new(
            TaskStore::new(),
            stages,
            PipelineSettings::default(),
            ArtifactLayout::new(root.path()),
        );

        let held = orchestrator.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.runs();
            panic!("poison the run table");
        })
        .join();
        assert!(orchestrator.inner.runs.is_poisoned());

        let id = orchestrator
            .submit(SubmitRequest {
                topic: "How tides work".into(),
                duration: Some(Duration::from_secs(10)),
                key_points: vec![],
                credentials: Credentials::new("llm-key", "search-key"),
                review: false,
            })
            .await
            .unwrap();
        assert!(orchestrator.runs().contains_key(&id));
        let status = orchestrator.join(id).await.unwrap();
        assert_eq!(status.state, TaskState::Completed);
    }

    #[test]
    fn test_malformed_id_is_not_found() {
        assert!(matches!(
            parse_task_id("nope"),
            Err(OrchestratorError::NotFound(_))
        ));
    }
}
