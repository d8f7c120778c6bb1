//! # Instance History
//!
//! The append-only step log each orchestration instance owns, and the replay fold that
//! turns it back into "what has already happened" on restart.

use crate::error::{MigrationError, Result};
use crate::orchestration::error_classifier::{ErrorCategory, ErrorClassification};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Failure recorded in a history and handed back to orchestrator code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
}

impl TaskFailure {
    pub fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Cancelled, "CANCELLED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, "HOST_ERROR", message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }

    /// Turn the failure of a call into the error of the orchestration that made it
    pub fn into_error(self, operation: &str) -> MigrationError {
        match self.category {
            ErrorCategory::Cancelled => MigrationError::Cancelled(self.message),
            ErrorCategory::InvalidInput => MigrationError::InvalidInput(self.message),
            _ => MigrationError::ActivityFailed {
                activity: operation.to_string(),
                reason: self.message,
            },
        }
    }
}

impl From<&ErrorClassification> for TaskFailure {
    fn from(classification: &ErrorClassification) -> Self {
        Self::new(
            classification.error_category,
            classification.error_code.clone(),
            classification.error_message.clone(),
        )
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// One entry of an instance's step log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    ExecutionStarted {
        name: String,
        input: Value,
    },
    ActivityScheduled {
        seq: u64,
        name: String,
        input: Value,
    },
    ActivityCompleted {
        seq: u64,
        output: Value,
    },
    ActivityFailed {
        seq: u64,
        failure: TaskFailure,
    },
    SubOrchestrationScheduled {
        seq: u64,
        name: String,
        instance_id: String,
        input: Value,
    },
    SubOrchestrationCompleted {
        seq: u64,
        output: Value,
    },
    SubOrchestrationFailed {
        seq: u64,
        failure: TaskFailure,
    },
    ExecutionCompleted {
        output: Value,
    },
    ExecutionFailed {
        failure: TaskFailure,
    },
}

impl HistoryEvent {
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::ActivityScheduled { seq, .. }
            | Self::ActivityCompleted { seq, .. }
            | Self::ActivityFailed { seq, .. }
            | Self::SubOrchestrationScheduled { seq, .. }
            | Self::SubOrchestrationCompleted { seq, .. }
            | Self::SubOrchestrationFailed { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExecutionCompleted { .. } | Self::ExecutionFailed { .. }
        )
    }

    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Self::ActivityCompleted { .. }
                | Self::ActivityFailed { .. }
                | Self::SubOrchestrationCompleted { .. }
                | Self::SubOrchestrationFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Activity,
    SubOrchestration,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activity => write!(f, "activity"),
            Self::SubOrchestration => write!(f, "sub_orchestration"),
        }
    }
}

/// Recorded result of a call or of a whole instance
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Value),
    Failed(TaskFailure),
}

impl Outcome {
    pub fn into_result(self) -> std::result::Result<Value, TaskFailure> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(failure) => Err(failure),
        }
    }
}

/// A call found in the history, with its outcome if one was recorded
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCall {
    pub kind: CallKind,
    pub name: String,
    /// Child instance id for sub-orchestrations
    pub instance_id: Option<String>,
    pub outcome: Option<Outcome>,
}

impl ScheduledCall {
    /// Describe how this recorded call differs from the one being made, if it does
    pub fn mismatch(&self, kind: CallKind, name: &str, instance_id: Option<&str>) -> Option<String> {
        if self.kind != kind || self.name != name || self.instance_id.as_deref() != instance_id {
            Some(format!(
                "history recorded {} '{}'{} but code scheduled {} '{}'{}",
                self.kind,
                self.name,
                self.instance_id
                    .as_deref()
                    .map(|id| format!(" ({id})"))
                    .unwrap_or_default(),
                kind,
                name,
                instance_id.map(|id| format!(" ({id})")).unwrap_or_default(),
            ))
        } else {
            None
        }
    }
}

/// Everything an instance's history says has already happened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayState {
    started: Option<(String, Value)>,
    scheduled: BTreeMap<u64, ScheduledCall>,
    terminal: Option<Outcome>,
}

impl ReplayState {
    /// Fold a history into replay state. A completion without a matching schedule means
    /// the history is corrupt.
    pub fn fold(history: &[HistoryEvent]) -> Result<Self> {
        let mut state = ReplayState::default();

        for event in history {
            match event {
                HistoryEvent::ExecutionStarted { name, input } => {
                    state.started = Some((name.clone(), input.clone()));
                }
                HistoryEvent::ActivityScheduled { seq, name, .. } => {
                    state.scheduled.insert(
                        *seq,
                        ScheduledCall {
                            kind: CallKind::Activity,
                            name: name.clone(),
                            instance_id: None,
                            outcome: None,
                        },
                    );
                }
                HistoryEvent::SubOrchestrationScheduled {
                    seq,
                    name,
                    instance_id,
                    ..
                } => {
                    state.scheduled.insert(
                        *seq,
                        ScheduledCall {
                            kind: CallKind::SubOrchestration,
                            name: name.clone(),
                            instance_id: Some(instance_id.clone()),
                            outcome: None,
                        },
                    );
                }
                HistoryEvent::ActivityCompleted { seq, output }
                | HistoryEvent::SubOrchestrationCompleted { seq, output } => {
                    state.record_outcome(*seq, Outcome::Completed(output.clone()))?;
                }
                HistoryEvent::ActivityFailed { seq, failure }
                | HistoryEvent::SubOrchestrationFailed { seq, failure } => {
                    state.record_outcome(*seq, Outcome::Failed(failure.clone()))?;
                }
                HistoryEvent::ExecutionCompleted { output } => {
                    state.terminal = Some(Outcome::Completed(output.clone()));
                }
                HistoryEvent::ExecutionFailed { failure } => {
                    state.terminal = Some(Outcome::Failed(failure.clone()));
                }
            }
        }

        Ok(state)
    }

    fn record_outcome(&mut self, seq: u64, outcome: Outcome) -> Result<()> {
        match self.scheduled.get_mut(&seq) {
            Some(call) => {
                call.outcome = Some(outcome);
                Ok(())
            }
            None => Err(MigrationError::HistoryStoreError(format!(
                "completion recorded for unscheduled seq {seq}"
            ))),
        }
    }

    pub fn started(&self) -> Option<&(String, Value)> {
        self.started.as_ref()
    }

    pub fn terminal(&self) -> Option<&Outcome> {
        self.terminal.as_ref()
    }

    pub fn call(&self, seq: u64) -> Option<&ScheduledCall> {
        self.scheduled.get(&seq)
    }

    /// Calls scheduled but never completed; these will be dispatched again
    pub fn pending_calls(&self) -> usize {
        self.scheduled
            .values()
            .filter(|call| call.outcome.is_none())
            .count()
    }

    pub fn scheduled_calls(&self) -> usize {
        self.scheduled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_history() -> Vec<HistoryEvent> {
        vec![
            HistoryEvent::ExecutionStarted {
                name: "paging_sub_workflow".into(),
                input: json!({"divisionCode": "081", "chapter": "11"}),
            },
            HistoryEvent::ActivityScheduled {
                seq: 0,
                name: "get_page_count".into(),
                input: json!({"divisionCode": "081", "chapter": "11"}),
            },
            HistoryEvent::ActivityCompleted {
                seq: 0,
                output: json!(2),
            },
            HistoryEvent::SubOrchestrationScheduled {
                seq: 1,
                name: "etl_sub_workflow".into(),
                instance_id: "run:081:11:1".into(),
                input: json!({}),
            },
            HistoryEvent::SubOrchestrationScheduled {
                seq: 2,
                name: "etl_sub_workflow".into(),
                instance_id: "run:081:11:2".into(),
                input: json!({}),
            },
            HistoryEvent::SubOrchestrationFailed {
                seq: 2,
                failure: TaskFailure::internal("boom"),
            },
        ]
    }

    #[test]
    fn test_fold_tracks_outcomes() {
        let state = ReplayState::fold(&sample_history()).unwrap();

        assert_eq!(state.started().unwrap().0, "paging_sub_workflow");
        assert_eq!(state.scheduled_calls(), 3);
        assert_eq!(state.pending_calls(), 1);
        assert_eq!(
            state.call(0).unwrap().outcome,
            Some(Outcome::Completed(json!(2)))
        );
        assert!(state.call(1).unwrap().outcome.is_none());
        assert!(matches!(
            state.call(2).unwrap().outcome,
            Some(Outcome::Failed(_))
        ));
        assert!(state.terminal().is_none());
    }

    #[test]
    fn test_fold_rejects_orphan_completion() {
        let history = vec![HistoryEvent::ActivityCompleted {
            seq: 7,
            output: json!(null),
        }];
        assert!(matches!(
            ReplayState::fold(&history),
            Err(MigrationError::HistoryStoreError(_))
        ));
    }

    #[test]
    fn test_mismatch_detection() {
        let state = ReplayState::fold(&sample_history()).unwrap();
        let call = state.call(1).unwrap();

        assert!(call
            .mismatch(CallKind::SubOrchestration, "etl_sub_workflow", Some("run:081:11:1"))
            .is_none());
        assert!(call
            .mismatch(CallKind::SubOrchestration, "etl_sub_workflow", Some("run:081:11:9"))
            .is_some());
        assert!(call
            .mismatch(CallKind::Activity, "etl_sub_workflow", None)
            .is_some());
    }

    #[test]
    fn test_history_event_json_shape() {
        let event = HistoryEvent::ActivityScheduled {
            seq: 3,
            name: "migrate_record".into(),
            input: json!("0811500042"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "activity_scheduled");
        assert_eq!(json["seq"], 3);

        let back: HistoryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
