use crate::error::MigrationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on {event} in {instance_id}")]
    InvalidTransition {
        instance_id: String,
        from: String,
        event: String,
    },
}

impl From<StateMachineError> for MigrationError {
    fn from(error: StateMachineError) -> Self {
        MigrationError::OrchestrationError(error.to_string())
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
