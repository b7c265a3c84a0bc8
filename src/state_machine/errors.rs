use super::events::TaskEvent;
use super::states::TaskState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid transition: cannot apply '{event}' to a task in state '{from}'")]
    InvalidTransition { from: TaskState, event: TaskEvent },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
