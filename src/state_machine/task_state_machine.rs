use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskState,
};

/// Transition table for the analysis task lifecycle.
///
/// ```text
/// Pending --start--> Running --complete--> Completed
///                       |
///                       +--fail / abandon--> Failed
/// ```
///
/// Every other (state, event) pair is rejected. The table is pure; callers are
/// responsible for applying the returned state atomically with its payload.
pub struct TaskStateMachine;

impl TaskStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: TaskState,
        event: TaskEvent,
    ) -> StateMachineResult<TaskState> {
        let target = match (current_state, event) {
            (TaskState::Pending, TaskEvent::Start) => TaskState::Running,
            (TaskState::Running, TaskEvent::Complete) => TaskState::Completed,
            (TaskState::Running, TaskEvent::Fail) => TaskState::Failed,
            (TaskState::Running, TaskEvent::Abandon) => TaskState::Failed,

            (from, event) => return Err(StateMachineError::InvalidTransition { from, event }),
        };

        Ok(target)
    }

    /// State a task must be in for `event` to apply
    pub fn required_state(event: TaskEvent) -> TaskState {
        match event {
            TaskEvent::Start => TaskState::Pending,
            TaskEvent::Complete | TaskEvent::Fail | TaskEvent::Abandon => TaskState::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskState::Pending, TaskEvent::Start).unwrap(),
            TaskState::Running
        );
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskState::Running, TaskEvent::Complete)
                .unwrap(),
            TaskState::Completed
        );
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskState::Running, TaskEvent::Fail).unwrap(),
            TaskState::Failed
        );
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskState::Running, TaskEvent::Abandon)
                .unwrap(),
            TaskState::Failed
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // Double dispatch
        assert_eq!(
            TaskStateMachine::determine_target_state(TaskState::Running, TaskEvent::Start),
            Err(StateMachineError::InvalidTransition {
                from: TaskState::Running,
                event: TaskEvent::Start,
            })
        );

        // Cannot complete before a worker claims the task
        assert!(
            TaskStateMachine::determine_target_state(TaskState::Pending, TaskEvent::Complete)
                .is_err()
        );

        // Terminal states accept nothing
        for event in [
            TaskEvent::Start,
            TaskEvent::Complete,
            TaskEvent::Fail,
            TaskEvent::Abandon,
        ] {
            assert!(
                TaskStateMachine::determine_target_state(TaskState::Completed, event).is_err()
            );
            assert!(TaskStateMachine::determine_target_state(TaskState::Failed, event).is_err());
        }
    }

    #[test]
    fn test_required_state_agrees_with_table() {
        for event in [
            TaskEvent::Start,
            TaskEvent::Complete,
            TaskEvent::Fail,
            TaskEvent::Abandon,
        ] {
            let from = TaskStateMachine::required_state(event);
            assert!(TaskStateMachine::determine_target_state(from, event).is_ok());
        }
    }
}
