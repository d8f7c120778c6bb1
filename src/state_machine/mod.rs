// State machine module for the orchestration tree
//
// Every workflow level (root, paging, ETL) walks the same lifecycle; only the name of
// its discovery state differs.

pub mod errors;
pub mod events;
pub mod states;
pub mod workflow_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::WorkflowEvent;
pub use states::{WorkflowKind, WorkflowState};
pub use workflow_state_machine::WorkflowStateMachine;
