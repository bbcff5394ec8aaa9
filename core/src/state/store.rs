//! Concurrent registry of tasks keyed by id.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};

use super::cancel::CancelToken;
use super::task::{DegradedSegment, Task, TaskId, TaskStatus};
use super::transitions::{StateTransition, TransitionError};
use super::types::{MediaKind, TaskEvent, TaskState};
use crate::error::{StoreError, TaskError};

/// Shared handle to the task registry. Cloning is cheap.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<TaskStoreInner>,
}

struct TaskStoreInner {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
    event_tx: broadcast::Sender<TaskEvent>,
}

struct TaskEntry {
    task: Task,
    cancel: CancelToken,
    run_lock: Arc<Mutex<()>>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(TaskStoreInner {
                tasks: RwLock::new(HashMap::new()),
                event_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.event_tx.subscribe()
    }

    fn emit(&self, event: TaskEvent) {
        // no subscribers is fine
        let _ = self.inner.event_tx.send(event);
    }

    pub async fn insert(&self, task: Task) -> Result<TaskId, StoreError> {
        let id = task.id;
        {
            let mut tasks = self.inner.tasks.write().await;
            if tasks.contains_key(&id) {
                return Err(StoreError::Duplicate(id));
            }
            tasks.insert(
                id,
                TaskEntry {
                    task,
                    cancel: CancelToken::new(),
                    run_lock: Arc::new(Mutex::new(())),
                },
            );
        }
        self.emit(TaskEvent::Created {
            task_id: id,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    /// Cloned snapshot of the full record.
    pub async fn task(&self, id: TaskId) -> Result<Task, StoreError> {
        let tasks = self.inner.tasks.read().await;
        tasks
            .get(&id)
            .map(|e| e.task.clone())
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn status(&self, id: TaskId) -> Result<TaskStatus, StoreError> {
        let tasks = self.inner.tasks.read().await;
        tasks
            .get(&id)
            .map(|e| e.task.status())
            .ok_or(StoreError::NotFound(id))
    }

    /// All tasks, oldest first.
    pub async fn list(&self) -> Vec<TaskStatus> {
        let tasks = self.inner.tasks.read().await;
        let mut out: Vec<TaskStatus> = tasks.values().map(|e| e.task.status()).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    /// Mutates a live task under the write lock. State changes must go
    /// through [`transition_with`](Self::transition_with); finished tasks are
    /// frozen and reject updates.
    pub async fn update<F, R>(&self, id: TaskId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Task) -> R,
    {
        let mut tasks = self.inner.tasks.write().await;
        let entry = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if entry.task.state.is_terminal() {
            return Err(StoreError::Transition {
                task_id: id,
                source: TransitionError::FromTerminalState {
                    state: entry.task.state,
                },
            });
        }
        let out = f(&mut entry.task);
        entry.task.updated_at = Utc::now();
        Ok(out)
    }

    pub async fn transition(&self, id: TaskId, to: TaskState) -> Result<(), StoreError> {
        self.transition_with(id, to, |_| {}).await
    }

    /// Validates and applies a state change together with its side effect in
    /// one critical section.
    pub async fn transition_with<F>(
        &self,
        id: TaskId,
        to: TaskState,
        f: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let event = {
            let mut tasks = self.inner.tasks.write().await;
            let entry = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            let from = entry.task.state;
            StateTransition::validate(from, to).map_err(|source| StoreError::Transition {
                task_id: id,
                source,
            })?;

            f(&mut entry.task);
            let now = Utc::now();
            entry.task.state = to;
            entry.task.updated_at = now;
            entry.task.history.push((to, now));

            tracing::debug!(
                target: "forgetube.store",
                task_id = %id,
                from = %from,
                to = %to,
                "task state changed"
            );

            let changed = TaskEvent::StateChanged {
                task_id: id,
                old: from,
                new: to,
                timestamp: now,
            };
            let terminal = match to {
                TaskState::Completed => Some(TaskEvent::Completed {
                    task_id: id,
                    duration_ms: entry.task.elapsed_ms(),
                    timestamp: now,
                }),
                TaskState::Failed => entry.task.last_error.as_ref().map(|e| TaskEvent::Failed {
                    task_id: id,
                    kind: e.kind,
                    summary: e.summary.clone(),
                    timestamp: now,
                }),
                _ => None,
            };
            (changed, terminal)
        };

        self.emit(event.0);
        if let Some(terminal) = event.1 {
            self.emit(terminal);
        }
        Ok(())
    }

    /// Moves a live task to `Failed` with `error`. Returns `false` when the
    /// task already reached a terminal state and was left untouched.
    pub async fn fail(&self, id: TaskId, error: TaskError) -> Result<bool, StoreError> {
        if self.task(id).await?.state.is_terminal() {
            return Ok(false);
        }
        match self
            .transition_with(id, TaskState::Failed, |task| {
                task.last_error = Some(error);
            })
            .await
        {
            Ok(()) => Ok(true),
            // lost a race against cancel
            Err(StoreError::Transition { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Marks the task `Cancelled` and trips its token. A task that already
    /// finished keeps its state. Returns the state after the call.
    pub async fn cancel(&self, id: TaskId) -> Result<TaskState, StoreError> {
        let token = self.cancel_token(id).await?;
        match self.transition(id, TaskState::Cancelled).await {
            Ok(()) => {
                token.cancel();
                Ok(TaskState::Cancelled)
            }
            Err(StoreError::Transition { .. }) => Ok(self.task(id).await?.state),
            Err(e) => Err(e),
        }
    }

    pub async fn cancel_token(&self, id: TaskId) -> Result<CancelToken, StoreError> {
        let tasks = self.inner.tasks.read().await;
        tasks
            .get(&id)
            .map(|e| e.cancel.clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// Exclusive right to drive the task's pipeline. Held for the whole run.
    pub async fn acquire_run(&self, id: TaskId) -> Result<OwnedMutexGuard<()>, StoreError> {
        let lock = {
            let tasks = self.inner.tasks.read().await;
            tasks
                .get(&id)
                .map(|e| Arc::clone(&e.run_lock))
                .ok_or(StoreError::NotFound(id))?
        };
        lock.try_lock_owned()
            .map_err(|_| StoreError::AlreadyRunning(id))
    }

    pub async fn set_progress(
        &self,
        id: TaskId,
        media: MediaKind,
        done: usize,
        total: usize,
    ) -> Result<(), StoreError> {
        self.update(id, |task| {
            let stage = task.progress.stage_mut(media);
            stage.done = done;
            stage.total = total;
        })
        .await?;
        self.emit(TaskEvent::Progress {
            task_id: id,
            media,
            done,
            total,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub async fn record_degraded(
        &self,
        id: TaskId,
        segment: DegradedSegment,
    ) -> Result<(), StoreError> {
        let (media, index) = (segment.media, segment.index);
        self.update(id, |task| task.degraded.push(segment)).await?;
        self.emit(TaskEvent::SegmentDegraded {
            task_id: id,
            media,
            index,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub(crate) fn emit_revision(&self, id: TaskId, revision: u32) {
        self.emit(TaskEvent::TimelineRevised {
            task_id: id,
            revision,
            timestamp: Utc::now(),
        });
    }

    pub async fn stats(&self) -> StoreStats {
        let tasks = self.inner.tasks.read().await;
        let mut stats = StoreStats::default();
        for entry in tasks.values() {
            match entry.task.state {
                TaskState::Completed => stats.completed += 1,
                TaskState::Failed => stats.failed += 1,
                TaskState::Cancelled => stats.cancelled += 1,
                TaskState::Queued => stats.queued += 1,
                _ => stats.running += 1,
            }
        }
        stats
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}
