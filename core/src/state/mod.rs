//! Task lifecycle: states, legal transitions, and the task store.
//!
//! The store is the only owner of [`Task`] records. Callers receive cloned
//! [`TaskStatus`] snapshots; a pipeline run mutates its own task through
//! [`TaskStore::update`] and [`TaskStore::transition_with`].

pub mod cancel;
pub mod store;
pub mod task;
pub mod transitions;
pub mod types;

pub use cancel::CancelToken;
pub use store::{StoreStats, TaskStore};
pub use task::{
    Artifacts, Credentials, DegradedSegment, StageProgress, Task, TaskId, TaskProgress,
    TaskStatus,
};
pub use transitions::{StateTransition, TransitionError};
pub use types::{MediaKind, TaskEvent, TaskState};
