//! Error types for the consolidation migration.
//!

use crate::config::ConfigurationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    /// Bounds were empty or contained blank values; nothing may run.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The source or target gateway failed in a way that may succeed on retry.
    #[error("Transient gateway error during {operation}: {reason}")]
    TransientGatewayError { operation: String, reason: String },
    /// The record disappeared between listing and fetch.
    #[error("Source record {source_id} not found")]
    SourceRecordNotFound { source_id: String },
    #[error("Permanent record error for {source_id}: {reason}")]
    PermanentRecordError { source_id: String, reason: String },
    /// A concurrent writer touched the same target record.
    #[error("Target write conflict for {target_id}")]
    TargetWriteConflict { target_id: String },
    /// An activity exhausted its attempts; the orchestration that scheduled it gives up.
    #[error("Activity {activity} failed: {reason}")]
    ActivityFailed { activity: String, reason: String },
    /// Orchestrator code made a different decision than the one recorded in its history.
    #[error("Replay inconsistency in {instance_id}: {reason}")]
    ReplayInconsistency { instance_id: String, reason: String },
    #[error("Operation {operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("History store error: {0}")]
    HistoryStoreError(String),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
}

impl MigrationError {
    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransientGatewayError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn permanent(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermanentRecordError {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    pub fn replay_inconsistency(instance_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReplayInconsistency {
            instance_id: instance_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(error: serde_json::Error) -> Self {
        MigrationError::InvalidInput(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for MigrationError {
    fn from(error: ConfigurationError) -> Self {
        MigrationError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MigrationError::transient("page_count", "connection reset");
        assert_eq!(
            error.to_string(),
            "Transient gateway error during page_count: connection reset"
        );

        let error = MigrationError::SourceRecordNotFound {
            source_id: "0811500042".to_string(),
        };
        assert_eq!(error.to_string(), "Source record 0811500042 not found");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let error: MigrationError = parse.unwrap_err().into();
        assert!(matches!(error, MigrationError::InvalidInput(_)));
    }
}
