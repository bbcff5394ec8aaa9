#[allow(clippy::module_inception)]
pub mod error;
pub mod orchestrator;
pub mod stage;

pub use error::{CliError, ErrorKind, TaskError};
pub use orchestrator::{OrchestratorError, StoreError};
pub use stage::{
    AssemblyError, RenderError, ScriptAttemptError, SegmentError, StageError, SynthesisError,
};
