use serde::{Deserialize, Serialize};

/// Events that drive a workflow through its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    Start,
    /// Discovery finished with this many units of work (predicates, pages or record ids)
    Discovered(usize),
    /// Every child has been dispatched
    FannedOut,
    /// Every child has reported back
    Settled,
    Fail(String),
    Cancel,
}

impl WorkflowEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Discovered(_) => "discovered",
            Self::FannedOut => "fanned_out",
            Self::Settled => "settled",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}
