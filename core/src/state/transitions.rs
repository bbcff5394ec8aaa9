//! Legal moves of the task state machine.

use super::types::TaskState;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskState, to: TaskState },

    #[error("cannot transition from terminal state {state}")]
    FromTerminalState { state: TaskState },
}

pub struct StateTransition;

impl StateTransition {
    /// Forward chain only; `Failed` and `Cancelled` are reachable from any
    /// non-terminal state.
    pub fn validate(from: TaskState, to: TaskState) -> Result<(), TransitionError> {
        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            (TaskState::Queued, TaskState::ScriptGenerating) => true,
            (TaskState::ScriptGenerating, TaskState::ScriptReady) => true,
            (TaskState::ScriptReady, TaskState::MediaGenerating) => true,
            (TaskState::MediaGenerating, TaskState::Assembling) => true,
            (TaskState::Assembling, TaskState::Completed) => true,

            (_, TaskState::Failed) | (_, TaskState::Cancelled) => true,

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    pub fn next_state(current: TaskState) -> Option<TaskState> {
        match current {
            TaskState::Queued => Some(TaskState::ScriptGenerating),
            TaskState::ScriptGenerating => Some(TaskState::ScriptReady),
            TaskState::ScriptReady => Some(TaskState::MediaGenerating),
            TaskState::MediaGenerating => Some(TaskState::Assembling),
            TaskState::Assembling => Some(TaskState::Completed),
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskState; 8] = [
        TaskState::Queued,
        TaskState::ScriptGenerating,
        TaskState::ScriptReady,
        TaskState::MediaGenerating,
        TaskState::Assembling,
        TaskState::Completed,
        TaskState::Failed,
        TaskState::Cancelled,
    ];

    #[test]
    fn test_forward_chain() {
        let mut state = TaskState::Queued;
        while let Some(next) = StateTransition::next_state(state) {
            assert!(StateTransition::validate(state, next).is_ok());
            state = next;
        }
        assert_eq!(state, TaskState::Completed);
    }

    #[test]
    fn test_no_skipping_or_regression() {
        assert!(StateTransition::validate(TaskState::Queued, TaskState::MediaGenerating).is_err());
        assert!(
            StateTransition::validate(TaskState::MediaGenerating, TaskState::ScriptReady).is_err()
        );
        assert!(StateTransition::validate(TaskState::ScriptReady, TaskState::ScriptReady).is_err());
    }

    #[test]
    fn test_failed_and_cancelled_from_any_live_state() {
        for from in ALL.iter().copied().filter(|s| !s.is_terminal()) {
            assert!(StateTransition::validate(from, TaskState::Failed).is_ok());
            assert!(StateTransition::validate(from, TaskState::Cancelled).is_ok());
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in ALL.iter().copied().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert_eq!(
                    StateTransition::validate(from, to),
                    Err(TransitionError::FromTerminalState { state: from })
                );
            }
        }
    }
}
