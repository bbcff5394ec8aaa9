#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use forgetube_core::orchestrator::{
    ArtifactLayout, Orchestrator, PipelineSettings, Stages, SubmitRequest,
};
use forgetube_core::stage::fake::{
    FakeAssembler, FakeImageRenderer, FakeScriptBackend, FakeSpeechSynthesizer,
};
use forgetube_core::stage::{RetryPolicy, SegmentPolicy};
use forgetube_core::state::{Credentials, TaskId, TaskState, TaskStatus, TaskStore};
use tempfile::TempDir;

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub script: Arc<FakeScriptBackend>,
    pub images: Arc<FakeImageRenderer>,
    pub root: TempDir,
}

pub fn settings() -> PipelineSettings {
    let media = SegmentPolicy {
        retry: RetryPolicy::immediate(2),
        concurrency: 2,
    };
    PipelineSettings {
        script_retries: 2,
        image: media,
        audio: media,
        chunk_size: Duration::from_secs(10),
        default_duration: Duration::from_secs(60),
        max_duration: Duration::from_secs(300),
    }
}

pub fn harness(script: FakeScriptBackend, images: FakeImageRenderer) -> Harness {
    harness_with(script, images, FakeAssembler::new())
}

pub fn harness_with(
    script: FakeScriptBackend,
    images: FakeImageRenderer,
    assembler: FakeAssembler,
) -> Harness {
    build(script, images, FakeSpeechSynthesizer::new(), assembler)
}

pub fn harness_with_speech(script: FakeScriptBackend, speech: FakeSpeechSynthesizer) -> Harness {
    build(script, FakeImageRenderer::new(), speech, FakeAssembler::new())
}

fn build(
    script: FakeScriptBackend,
    images: FakeImageRenderer,
    speech: FakeSpeechSynthesizer,
    assembler: FakeAssembler,
) -> Harness {
    let script = Arc::new(script);
    let images = Arc::new(images);
    let stages = Stages {
        script: script.clone(),
        images: images.clone(),
        speech: Arc::new(speech),
        assembler: Arc::new(assembler),
    };
    let (orchestrator, root) = orchestrator_with(stages);
    Harness {
        orchestrator,
        script,
        images,
        root,
    }
}

/// Orchestrator over arbitrary stages, writing into a fresh temp dir.
pub fn orchestrator_with(stages: Stages) -> (Orchestrator, TempDir) {
    let root = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(
        TaskStore::new(),
        stages,
        settings(),
        ArtifactLayout::new(root.path()),
    );
    (orchestrator, root)
}

pub fn request(review: bool) -> SubmitRequest {
    SubmitRequest {
        topic: "How tides work".to_string(),
        duration: Some(Duration::from_secs(30)),
        key_points: vec!["moon".to_string(), "gravity".to_string()],
        credentials: Credentials::new("llm-key", "search-key"),
        review,
    }
}

/// Polls until the task reaches `state`; panics after five seconds.
pub async fn wait_for_state(orchestrator: &Orchestrator, id: TaskId, state: TaskState) -> TaskStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = orchestrator.get_status(id).await.expect("status");
        if status.state == state {
            return status;
        }
        assert!(
            !status.state.is_terminal(),
            "task ended in {} while waiting for {state}",
            status.state
        );
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {state}, task is {}",
            status.state
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
