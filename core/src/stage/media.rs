//! Per-segment fan-out shared by the image and audio stages.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::retry::RetryPolicy;
use super::scheduler::fan_out;
use crate::error::{SegmentError, StageError};
use crate::state::{CancelToken, DegradedSegment, MediaKind};

/// Produces one artifact per timeline segment.
#[async_trait]
pub trait SegmentGenerator: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    fn kind(&self) -> MediaKind;

    async fn generate(
        &self,
        index: usize,
        input: &Self::Input,
    ) -> Result<Self::Output, SegmentError>;

    /// Stand-in used once every attempt for `index` failed.
    fn placeholder(&self, index: usize, input: &Self::Input) -> Self::Output;
}

/// Receives progress while a media stage runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn progress(&self, media: MediaKind, done: usize, total: usize);
    async fn degraded(&self, segment: DegradedSegment);
}

/// Sink that drops everything.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn progress(&self, _media: MediaKind, _done: usize, _total: usize) {}
    async fn degraded(&self, _segment: DegradedSegment) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPolicy {
    pub retry: RetryPolicy,
    pub concurrency: usize,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 2,
        }
    }
}

#[derive(Debug)]
pub struct MediaOutcome<T> {
    /// One entry per input, in input order.
    pub artifacts: Vec<T>,
    pub degraded: Vec<DegradedSegment>,
}

enum SegmentOutcome<T> {
    Generated(T),
    Degraded(T, DegradedSegment),
    Cancelled,
}

pub struct MediaStage<G> {
    generator: G,
    policy: SegmentPolicy,
}

impl<G: SegmentGenerator> MediaStage<G> {
    pub fn new(generator: G, policy: SegmentPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generates every segment. The result is always complete and
    /// index-aligned unless the run was cancelled.
    pub async fn run(
        &self,
        inputs: &[G::Input],
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<MediaOutcome<G::Output>, StageError> {
        let kind = self.generator.kind();
        let total = inputs.len();
        let done = AtomicUsize::new(0);
        sink.progress(kind, 0, total).await;

        let done = &done;
        let outcomes = fan_out(total, self.policy.concurrency, move |index| {
            self.run_segment(index, &inputs[index], cancel, sink, done, total)
        })
        .await;

        let mut artifacts = Vec::with_capacity(total);
        let mut degraded = Vec::new();
        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Generated(artifact) => artifacts.push(artifact),
                SegmentOutcome::Degraded(artifact, record) => {
                    artifacts.push(artifact);
                    degraded.push(record);
                }
                SegmentOutcome::Cancelled => return Err(StageError::Cancelled),
            }
        }
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        tracing::info!(
            target: "forgetube.media",
            media = %kind,
            total,
            degraded = degraded.len(),
            "media stage settled"
        );
        Ok(MediaOutcome {
            artifacts,
            degraded,
        })
    }

    async fn run_segment(
        &self,
        index: usize,
        input: &G::Input,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
        done: &AtomicUsize,
        total: usize,
    ) -> SegmentOutcome<G::Output> {
        let kind = self.generator.kind();
        let retry = self.policy.retry;
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..retry.max_attempts() {
            if cancel.is_cancelled() {
                return SegmentOutcome::Cancelled;
            }
            attempts = attempt + 1;
            let result = tokio::select! {
                r = self.generator.generate(index, input) => r,
                _ = cancel.cancelled() => return SegmentOutcome::Cancelled,
            };
            match result {
                Ok(artifact) => {
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    sink.progress(kind, n, total).await;
                    return SegmentOutcome::Generated(artifact);
                }
                Err(e) => {
                    tracing::warn!(
                        target: "forgetube.media",
                        media = %kind,
                        index,
                        attempt = attempts,
                        error = %e,
                        "segment attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if let Some(delay) = retry.next_delay(attempt) {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return SegmentOutcome::Cancelled,
                }
            }
        }

        let record = DegradedSegment {
            media: kind,
            index,
            attempts,
            kind: last_error
                .as_ref()
                .map(SegmentError::kind)
                .unwrap_or(crate::error::ErrorKind::Internal),
            error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        };
        tracing::warn!(
            target: "forgetube.media",
            media = %kind,
            index,
            attempts,
            "segment replaced by placeholder"
        );
        sink.degraded(record.clone()).await;
        let n = done.fetch_add(1, Ordering::SeqCst) + 1;
        sink.progress(kind, n, total).await;
        SegmentOutcome::Degraded(self.generator.placeholder(index, input), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fails the first `failures[index]` calls of each index.
    struct Flaky {
        failures: HashMap<usize, u32>,
        calls: Mutex<HashMap<usize, u32>>,
    }

    #[async_trait]
    impl SegmentGenerator for Flaky {
        type Input = String;
        type Output = String;

        fn kind(&self) -> MediaKind {
            MediaKind::Image
        }

        async fn generate(&self, index: usize, input: &String) -> Result<String, SegmentError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(index).or_insert(0);
                *n += 1;
                *n
            };
            if call <= self.failures.get(&index).copied().unwrap_or(0) {
                return Err(RenderError::new(format!("boom {index}")).into());
            }
            Ok(format!("rendered {input}"))
        }

        fn placeholder(&self, index: usize, _input: &String) -> String {
            format!("placeholder {index}")
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<(usize, usize)>>,
        degraded: Mutex<Vec<DegradedSegment>>,
    }

    #[async_trait]
    impl ProgressSink for Recorder {
        async fn progress(&self, _media: MediaKind, done: usize, total: usize) {
            self.progress.lock().unwrap().push((done, total));
        }
        async fn degraded(&self, segment: DegradedSegment) {
            self.degraded.lock().unwrap().push(segment);
        }
    }

    fn stage(failures: &[(usize, u32)], retries: u32) -> MediaStage<Flaky> {
        MediaStage::new(
            Flaky {
                failures: failures.iter().copied().collect(),
                calls: Mutex::new(HashMap::new()),
            },
            SegmentPolicy {
                retry: RetryPolicy::immediate(retries),
                concurrency: 2,
            },
        )
    }

    fn inputs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("scene {i}")).collect()
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let stage = stage(&[(1, 2)], 2);
        let out = stage
            .run(&inputs(3), &CancelToken::new(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(out.artifacts[1], "rendered scene 1");
        assert!(out.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_segment_gets_placeholder() {
        let stage = stage(&[(3, 10)], 2);
        let sink = Recorder::default();
        let out = stage
            .run(&inputs(5), &CancelToken::new(), &sink)
            .await
            .unwrap();

        assert_eq!(out.artifacts.len(), 5);
        assert_eq!(out.artifacts[3], "placeholder 3");
        assert_eq!(out.artifacts[4], "rendered scene 4");
        assert_eq!(out.degraded.len(), 1);
        assert_eq!(out.degraded[0].index, 3);
        assert_eq!(out.degraded[0].attempts, 3);
        assert_eq!(out.degraded[0].kind, crate::error::ErrorKind::Render);

        assert_eq!(sink.degraded.lock().unwrap().len(), 1);
        assert_eq!(sink.progress.lock().unwrap().last(), Some(&(5, 5)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let stage = stage(&[], 0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = stage.run(&inputs(3), &cancel, &NoProgress).await.unwrap_err();
        assert!(matches!(err, StageError::Cancelled));
        assert!(stage.generator().calls.lock().unwrap().is_empty());
    }
}
