// State machine for the analysis task lifecycle.
//
// Persistence lives in the task stores; this module only defines the states,
// the events and the transition table every store applies.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskState;
pub use task_state_machine::TaskStateMachine;
