//! One pipeline run: script, optional review, media, subtitles, assembly.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::{ArtifactLayout, PipelineSettings, ReviewCommand, Stages, TaskPaths};
use crate::assembly::{measured_durations, AssemblyJob};
use crate::error::{ErrorKind, StageError, StoreError, TaskError};
use crate::stage::{
    AudioArtifact, ImageArtifact, ImageGenerator, MediaStage, ProgressSink, ScriptRequest,
    ScriptStage, SpeechGenerator, SpeechInput,
};
use crate::state::{CancelToken, DegradedSegment, MediaKind, Task, TaskId, TaskState, TaskStore};
use crate::subtitle::{chunk_cues, render_srt};
use crate::timeline::Timeline;

pub(crate) struct RunContext {
    pub id: TaskId,
    pub store: TaskStore,
    pub stages: Stages,
    pub settings: PipelineSettings,
    pub layout: ArtifactLayout,
}

/// Why a run stopped before `Completed`.
enum Halt {
    Cancelled,
    Failed(TaskError),
}

impl From<StoreError> for Halt {
    fn from(err: StoreError) -> Self {
        match err {
            // the run follows the forward chain, so a rejected transition
            // means cancel moved the task to a terminal state
            StoreError::Transition { .. } => Halt::Cancelled,
            other => Halt::Failed(TaskError::internal(other.to_string())),
        }
    }
}

impl From<StageError> for Halt {
    fn from(err: StageError) -> Self {
        match &err {
            StageError::Cancelled => Halt::Cancelled,
            StageError::Exhausted { last, .. } => Halt::Failed(
                TaskError::new(ErrorKind::StageExhausted, err.to_string())
                    .with_cause(last.kind())
                    .at_segment(last.segment_index()),
            ),
        }
    }
}

fn checkpoint(cancel: &CancelToken) -> Result<(), Halt> {
    if cancel.is_cancelled() {
        Err(Halt::Cancelled)
    } else {
        Ok(())
    }
}

fn internal(context: &str, err: impl std::fmt::Display) -> Halt {
    Halt::Failed(TaskError::internal(format!("{context}: {err}")))
}

/// Runs [`drive`] in its own task so a panic inside a stage still leaves the
/// task in a terminal state.
pub(crate) async fn supervise(ctx: RunContext, commands: mpsc::Receiver<ReviewCommand>) {
    let id = ctx.id;
    let store = ctx.store.clone();
    let paths = ctx.layout.paths(id);

    let Err(err) = tokio::spawn(drive(ctx, commands)).await else {
        return;
    };
    let summary = if err.is_panic() {
        "pipeline run panicked"
    } else {
        "pipeline run aborted"
    };
    tracing::error!(target: "forgetube.pipeline", task_id = %id, error = %err, "{summary}");
    match store.fail(id, TaskError::internal(summary)).await {
        Ok(true) => {}
        Ok(false) => paths.discard_outputs().await,
        Err(e) => tracing::error!(
            target: "forgetube.pipeline",
            task_id = %id,
            error = %e,
            "cannot record failure"
        ),
    }
}

/// Entry point of the spawned run.
pub(crate) async fn drive(ctx: RunContext, mut commands: mpsc::Receiver<ReviewCommand>) {
    let id = ctx.id;
    let span = tracing::info_span!("pipeline", task_id = %id);
    async move {
        let _run = match ctx.store.acquire_run(id).await {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(target: "forgetube.pipeline", error = %e, "run not started");
                return;
            }
        };
        let cancel = match ctx.store.cancel_token(id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(target: "forgetube.pipeline", error = %e, "run not started");
                return;
            }
        };
        let paths = ctx.layout.paths(id);

        match run(&ctx, &cancel, &paths, &mut commands).await {
            Ok(video) => {
                tracing::info!(
                    target: "forgetube.pipeline",
                    video = %video.display(),
                    "task completed"
                );
            }
            Err(Halt::Cancelled) => {
                paths.discard_outputs().await;
                tracing::info!(target: "forgetube.pipeline", "task cancelled");
            }
            Err(Halt::Failed(error)) => {
                tracing::error!(
                    target: "forgetube.pipeline",
                    kind = %error.kind,
                    summary = %error.summary,
                    "task failed"
                );
                match ctx.store.fail(id, error).await {
                    Ok(true) => {}
                    Ok(false) => paths.discard_outputs().await,
                    Err(e) => tracing::error!(
                        target: "forgetube.pipeline",
                        error = %e,
                        "cannot record failure"
                    ),
                }
            }
        }
    }
    .instrument(span)
    .await
}

async fn run(
    ctx: &RunContext,
    cancel: &CancelToken,
    paths: &TaskPaths,
    commands: &mut mpsc::Receiver<ReviewCommand>,
) -> Result<PathBuf, Halt> {
    let id = ctx.id;
    let task = ctx.store.task(id).await?;
    let script = ScriptStage::new(ctx.stages.script.clone(), ctx.settings.script_retries);

    checkpoint(cancel)?;
    ctx.store.transition(id, TaskState::ScriptGenerating).await?;
    let request = ScriptRequest {
        topic: task.topic.clone(),
        duration: task.requested_duration,
        key_points: task.key_points.clone(),
    };
    let timeline = script
        .generate(&request, &task.credentials, cancel)
        .await?;

    checkpoint(cancel)?;
    paths
        .save_script(&timeline)
        .await
        .map_err(|e| internal("script", e))?;
    ctx.store
        .transition_with(id, TaskState::ScriptReady, |t| {
            t.timeline = Some(timeline);
            t.timeline_revision = 1;
        })
        .await?;
    ctx.store.emit_revision(id, 1);

    if task.review {
        review(ctx, &script, &task, paths, cancel, commands).await?;
    }

    checkpoint(cancel)?;
    let timeline = ctx
        .store
        .task(id)
        .await?
        .timeline
        .ok_or_else(|| internal("media", "no script stored"))?;
    ctx.store.transition(id, TaskState::MediaGenerating).await?;
    ctx.layout
        .prepare(id)
        .await
        .map_err(|e| internal("artifact directories", e))?;

    let (images, audio) = generate_media(ctx, &timeline, paths, cancel).await?;

    checkpoint(cancel)?;
    ctx.store
        .transition_with(id, TaskState::Assembling, |t| {
            t.artifacts.images = Some(images.clone());
            t.artifacts.audio = Some(audio.clone());
        })
        .await?;

    let cues = chunk_cues(
        &timeline.narration,
        &measured_durations(&audio),
        ctx.settings.chunk_size,
    )
    .map_err(|e| Halt::Failed(TaskError::new(ErrorKind::Assembly, e.to_string())))?;
    tokio::fs::write(&paths.subtitles, render_srt(&cues))
        .await
        .map_err(|e| internal("subtitles", e))?;
    let subtitles = paths.subtitles.clone();
    ctx.store
        .update(id, |t| t.artifacts.subtitles = Some(subtitles))
        .await?;

    checkpoint(cancel)?;
    let job = AssemblyJob {
        images,
        clips: audio,
        cues,
        subtitles_path: Some(paths.subtitles.clone()),
        visuals: timeline.visuals.clone(),
        output_path: paths.video.clone(),
    };
    tracing::info!(
        target: "forgetube.pipeline",
        assembler = ctx.stages.assembler.name(),
        windows = job.visuals.len(),
        cues = job.cues.len(),
        "assembling"
    );
    let assembled = ctx.stages.assembler.assemble(&job).await;

    // an assembly that finished after cancel must not leave a video behind
    checkpoint(cancel)?;
    let video = assembled
        .map_err(|e| Halt::Failed(TaskError::new(ErrorKind::Assembly, e.to_string())))?;

    let result = video.clone();
    ctx.store
        .transition_with(id, TaskState::Completed, |t| {
            t.artifacts.video = Some(result);
        })
        .await?;
    Ok(video)
}

/// Waits in `ScriptReady` for refine or dispatch commands.
async fn review(
    ctx: &RunContext,
    script: &ScriptStage,
    task: &Task,
    paths: &TaskPaths,
    cancel: &CancelToken,
    commands: &mut mpsc::Receiver<ReviewCommand>,
) -> Result<(), Halt> {
    tracing::info!(target: "forgetube.pipeline", "waiting for script review");
    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => return Err(Halt::Cancelled),
            command = commands.recv() => command,
        };
        let (feedback, reply) = match command {
            Some(ReviewCommand::Refine { feedback, reply }) => (feedback, reply),
            Some(ReviewCommand::Dispatch) | None => return Ok(()),
        };

        let current = ctx
            .store
            .task(ctx.id)
            .await?
            .timeline
            .ok_or_else(|| internal("review", "no script stored"))?;
        match script
            .refine(
                &current,
                &feedback,
                task.requested_duration,
                &task.credentials,
                cancel,
            )
            .await
        {
            Ok(refined) => {
                if cancel.is_cancelled() {
                    let _ = reply.send(Err("task cancelled".into()));
                    return Err(Halt::Cancelled);
                }
                if let Err(e) = paths.save_script(&refined).await {
                    let _ = reply.send(Err(format!("cannot save refined script: {e}")));
                    continue;
                }
                let revision = ctx
                    .store
                    .update(ctx.id, |t| {
                        t.timeline = Some(refined);
                        t.timeline_revision += 1;
                        t.timeline_revision
                    })
                    .await?;
                ctx.store.emit_revision(ctx.id, revision);
                tracing::info!(target: "forgetube.pipeline", revision, "script refined");
                let _ = reply.send(Ok(revision));
            }
            Err(StageError::Cancelled) => {
                let _ = reply.send(Err("task cancelled".into()));
                return Err(Halt::Cancelled);
            }
            Err(e) => {
                tracing::warn!(
                    target: "forgetube.pipeline",
                    error = %e,
                    "refinement failed, keeping previous script"
                );
                let _ = reply.send(Err(e.to_string()));
            }
        }
    }
}

async fn generate_media(
    ctx: &RunContext,
    timeline: &Timeline,
    paths: &TaskPaths,
    cancel: &CancelToken,
) -> Result<(Vec<ImageArtifact>, Vec<AudioArtifact>), Halt> {
    let image_stage = MediaStage::new(
        ImageGenerator::new(ctx.stages.images.clone(), &paths.images),
        ctx.settings.image,
    );
    let audio_stage = MediaStage::new(
        SpeechGenerator::new(ctx.stages.speech.clone(), &paths.audio),
        ctx.settings.audio,
    );
    let speech_inputs: Vec<SpeechInput> = timeline
        .narration
        .iter()
        .enumerate()
        .map(|(i, segment)| SpeechInput {
            segment: segment.clone(),
            planned: timeline.planned_window(i).unwrap_or_default(),
        })
        .collect();
    let sink = StoreProgress {
        store: &ctx.store,
        id: ctx.id,
    };

    let (images, audio) = tokio::join!(
        image_stage.run(&timeline.visuals, cancel, &sink),
        audio_stage.run(&speech_inputs, cancel, &sink),
    );
    Ok((images?.artifacts, audio?.artifacts))
}

/// Mirrors media progress into the task store.
struct StoreProgress<'a> {
    store: &'a TaskStore,
    id: TaskId,
}

#[async_trait]
impl<'a> ProgressSink for StoreProgress<'a> {
    async fn progress(&self, media: MediaKind, done: usize, total: usize) {
        if let Err(e) = self.store.set_progress(self.id, media, done, total).await {
            tracing::warn!(target: "forgetube.pipeline", error = %e, "progress not recorded");
        }
    }

    async fn degraded(&self, segment: DegradedSegment) {
        if let Err(e) = self.store.record_degraded(self.id, segment).await {
            tracing::warn!(target: "forgetube.pipeline", error = %e, "degraded segment not recorded");
        }
    }
}
