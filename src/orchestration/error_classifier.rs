//! # Activity Error Classification
//!
//! Decides how the host treats a failed activity attempt or orchestration: retry it,
//! surface it as permanent, or treat it as a cancellation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ MigrationError  │────▶│ ErrorClassifier │────▶│ Classification  │
//! │ + Context       │     │ Strategy        │     │ Result          │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use consolidation_migration::error::MigrationError;
//! use consolidation_migration::orchestration::error_classifier::{
//!     ErrorClassifier, ErrorContext, StandardErrorClassifier,
//! };
//!
//! let classifier = StandardErrorClassifier::new();
//! let context = ErrorContext::new("run-1:081:11:1", "migrate_record", 1, 3);
//! let error = MigrationError::transient("fetch_record", "connection reset");
//!
//! let classification = classifier.classify_error(&error, &context);
//! assert!(classification.is_retryable);
//! ```

use crate::error::MigrationError;
use serde::{Deserialize, Serialize};

/// Context information for error classification
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Instance that scheduled the failing call
    pub instance_id: String,

    /// Activity or orchestration name
    pub operation: String,

    /// Current attempt number (1-based)
    pub attempt_number: u32,

    /// Maximum allowed attempts
    pub max_attempts: u32,
}

impl ErrorContext {
    pub fn new(
        instance_id: impl Into<String>,
        operation: impl Into<String>,
        attempt_number: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            operation: operation.into(),
            attempt_number,
            max_attempts,
        }
    }

    /// Context for a failure that is never retried at this level
    pub fn final_attempt(instance_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(instance_id, operation, 1, 1)
    }

    fn has_attempts_remaining(&self) -> bool {
        self.attempt_number < self.max_attempts
    }
}

/// Result of error classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    /// Primary error category
    pub error_category: ErrorCategory,

    /// Whether this error should be retried now, taking remaining attempts into account
    pub is_retryable: bool,

    /// Specific error code for tracking
    pub error_code: String,

    /// Human-readable error message
    pub error_message: String,

    /// Whether this is the final attempt
    pub is_final_attempt: bool,
}

/// Primary error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Permanent error - will never succeed if retried
    Permanent,

    /// Transient error - may succeed on retry
    Transient,

    /// Timeout error - the attempt ran out of time
    Timeout,

    /// A concurrent writer touched the same record
    Conflict,

    /// The input can never be processed
    InvalidInput,

    /// Work was abandoned because of a cancellation
    Cancelled,

    /// History and orchestrator code disagree
    StateInconsistency,

    /// Configuration error - requires manual intervention
    Configuration,

    /// Host-side failure (store, panics, missing registrations)
    Internal,
}

impl ErrorCategory {
    /// Categories worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Timeout | Self::Conflict)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Permanent => write!(f, "Permanent"),
            ErrorCategory::Transient => write!(f, "Transient"),
            ErrorCategory::Timeout => write!(f, "Timeout"),
            ErrorCategory::Conflict => write!(f, "Conflict"),
            ErrorCategory::InvalidInput => write!(f, "Invalid Input"),
            ErrorCategory::Cancelled => write!(f, "Cancelled"),
            ErrorCategory::StateInconsistency => write!(f, "State Inconsistency"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    /// Classify an error and provide handling recommendations
    fn classify_error(&self, error: &MigrationError, context: &ErrorContext) -> ErrorClassification;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Standard error classifier for the migration error taxonomy
#[derive(Debug, Clone, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn category_and_code(error: &MigrationError) -> (ErrorCategory, &'static str) {
        match error {
            MigrationError::InvalidBounds(_) => (ErrorCategory::InvalidInput, "INVALID_BOUNDS"),
            MigrationError::InvalidInput(_) => (ErrorCategory::InvalidInput, "INVALID_INPUT"),
            MigrationError::TransientGatewayError { .. } => {
                (ErrorCategory::Transient, "TRANSIENT_GATEWAY_ERROR")
            }
            MigrationError::SourceRecordNotFound { .. } => {
                (ErrorCategory::Permanent, "SOURCE_RECORD_NOT_FOUND")
            }
            MigrationError::PermanentRecordError { .. } => {
                (ErrorCategory::Permanent, "PERMANENT_RECORD_ERROR")
            }
            MigrationError::TargetWriteConflict { .. } => {
                (ErrorCategory::Conflict, "TARGET_WRITE_CONFLICT")
            }
            MigrationError::ActivityFailed { .. } => (ErrorCategory::Permanent, "ACTIVITY_FAILED"),
            MigrationError::ReplayInconsistency { .. } => {
                (ErrorCategory::StateInconsistency, "REPLAY_INCONSISTENCY")
            }
            MigrationError::Timeout { .. } => (ErrorCategory::Timeout, "EXECUTION_TIMEOUT"),
            MigrationError::Cancelled(_) => (ErrorCategory::Cancelled, "CANCELLED"),
            MigrationError::ConfigurationError(_) => {
                (ErrorCategory::Configuration, "CONFIGURATION_ERROR")
            }
            MigrationError::HistoryStoreError(_) => (ErrorCategory::Internal, "HISTORY_STORE_ERROR"),
            MigrationError::OrchestrationError(_) => {
                (ErrorCategory::Internal, "ORCHESTRATION_ERROR")
            }
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_error(&self, error: &MigrationError, context: &ErrorContext) -> ErrorClassification {
        let (category, code) = Self::category_and_code(error);
        let is_final_attempt = !context.has_attempts_remaining();

        ErrorClassification {
            error_category: category,
            is_retryable: category.is_retryable() && !is_final_attempt,
            error_code: code.to_string(),
            error_message: format!(
                "{} failed in {} (attempt {}/{}): {}",
                context.operation,
                context.instance_id,
                context.attempt_number,
                context.max_attempts,
                error
            ),
            is_final_attempt,
        }
    }

    fn classifier_name(&self) -> &'static str {
        "standard"
    }
}
