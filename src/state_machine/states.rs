use serde::{Deserialize, Serialize};
use std::fmt;

/// Which level of the fan-out tree a workflow belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Partitions the bounds and fans out one paging workflow per predicate
    Root,
    /// Discovers the page count of one predicate and fans out one ETL workflow per page
    Paging,
    /// Lists the record ids of one page and fans out one migration activity per id
    Etl,
}

impl WorkflowKind {
    /// The working state entered on `Start`
    pub fn discovery_state(&self) -> WorkflowState {
        match self {
            Self::Root => WorkflowState::Partitioning,
            Self::Paging => WorkflowState::DiscoveringPageCount,
            Self::Etl => WorkflowState::FetchingIds,
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Paging => write!(f, "paging"),
            Self::Etl => write!(f, "etl"),
        }
    }
}

/// Workflow lifecycle states shared by every level of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Start,
    /// Root only: enumerating predicates
    Partitioning,
    /// Paging only: asking the source how many pages exist
    DiscoveringPageCount,
    /// ETL only: listing the record ids of one page
    FetchingIds,
    FanningOut,
    /// Fan-in barrier
    Awaiting,
    Done,
    Failed,
    Cancelled,
}

impl WorkflowState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Check if this is an active state (workflow is doing work)
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != Self::Start
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Partitioning => write!(f, "partitioning"),
            Self::DiscoveringPageCount => write!(f, "discovering_page_count"),
            Self::FetchingIds => write!(f, "fetching_ids"),
            Self::FanningOut => write!(f, "fanning_out"),
            Self::Awaiting => write!(f, "awaiting"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "partitioning" => Ok(Self::Partitioning),
            "discovering_page_count" => Ok(Self::DiscoveringPageCount),
            "fetching_ids" => Ok(Self::FetchingIds),
            "fanning_out" => Ok(Self::FanningOut),
            "awaiting" => Ok(Self::Awaiting),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid workflow state: {s}")),
        }
    }
}
