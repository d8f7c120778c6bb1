//! # Run Summaries
//!
//! Collect-then-decide fan-in results for each level of the orchestration tree.
//! Every level first gathers all child outcomes, then decides its own status.

use super::bounds::{Predicate, PredicateAndPage};
use super::record::{MigratedRecord, MigrationStatus, SourceRecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one level of the fan-out tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    PartiallyFailed,
    Failed,
    /// There was no work to do
    NoOp,
    Cancelled,
}

impl OutcomeStatus {
    /// Decide a parent's status from its children's statuses
    pub fn from_children<I>(children: I, cancel_requested: bool) -> Self
    where
        I: IntoIterator<Item = OutcomeStatus>,
    {
        let (mut succeeded, mut partial, mut failed, mut cancelled) = (0usize, 0usize, 0usize, 0usize);
        for child in children {
            match child {
                Self::Succeeded | Self::NoOp => succeeded += 1,
                Self::PartiallyFailed => partial += 1,
                Self::Failed => failed += 1,
                Self::Cancelled => cancelled += 1,
            }
        }

        if cancel_requested {
            return Self::Cancelled;
        }
        match (succeeded, partial, failed, cancelled) {
            (0, 0, 0, 0) => Self::NoOp,
            (_, 0, 0, 0) => Self::Succeeded,
            (0, 0, f, _) if f > 0 => Self::Failed,
            (0, 0, 0, _) => Self::Cancelled,
            _ => Self::PartiallyFailed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::NoOp)
    }
}

impl From<MigrationStatus> for OutcomeStatus {
    fn from(status: MigrationStatus) -> Self {
        match status {
            MigrationStatus::Migrated => Self::Succeeded,
            MigrationStatus::Failed => Self::Failed,
            MigrationStatus::Pending | MigrationStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::PartiallyFailed => write!(f, "partially_failed"),
            Self::Failed => write!(f, "failed"),
            Self::NoOp => write!(f, "no_op"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Record counts aggregated at every level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub attempted: usize,
    pub migrated: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub child_cases_migrated: usize,
    pub failed_source_ids: Vec<SourceRecordId>,
}

impl Tally {
    pub fn record(&mut self, record: &MigratedRecord) {
        self.attempted += 1;
        match record.status {
            MigrationStatus::Migrated => {
                self.migrated += 1;
                self.child_cases_migrated += record.child_case_count;
            }
            MigrationStatus::Failed => {
                self.failed += 1;
                self.failed_source_ids.push(record.source_id.clone());
            }
            MigrationStatus::Pending | MigrationStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn merge(&mut self, other: &Tally) {
        self.attempted += other.attempted;
        self.migrated += other.migrated;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
        self.child_cases_migrated += other.child_cases_migrated;
        self.failed_source_ids
            .extend(other.failed_source_ids.iter().cloned());
    }
}

/// One entry of the user-visible error list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    /// Instance that observed the failure
    pub instance_id: String,
    /// Set for record-level failures; absent when a whole page or partition failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceRecordId>,
    pub reason: String,
}

impl FailureEntry {
    pub fn record(instance_id: impl Into<String>, source_id: SourceRecordId, reason: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            source_id: Some(source_id),
            reason: reason.into(),
        }
    }

    pub fn structural(instance_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            source_id: None,
            reason: reason.into(),
        }
    }

    pub fn is_record_failure(&self) -> bool {
        self.source_id.is_some()
    }
}

/// Result of one ETL sub-workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub instance_id: String,
    pub predicate_and_page: PredicateAndPage,
    pub status: OutcomeStatus,
    pub tally: Tally,
    pub records: Vec<MigratedRecord>,
    pub errors: Vec<FailureEntry>,
}

impl PageSummary {
    pub fn from_records(
        instance_id: impl Into<String>,
        predicate_and_page: PredicateAndPage,
        records: Vec<MigratedRecord>,
        cancel_requested: bool,
    ) -> Self {
        let instance_id = instance_id.into();
        let mut tally = Tally::default();
        let mut errors = Vec::new();
        for record in &records {
            tally.record(record);
            if record.status == MigrationStatus::Failed {
                errors.push(FailureEntry::record(
                    instance_id.clone(),
                    record.source_id.clone(),
                    record.error.clone().unwrap_or_default(),
                ));
            }
        }
        let status = OutcomeStatus::from_children(
            records.iter().map(|record| OutcomeStatus::from(record.status)),
            cancel_requested,
        );

        Self {
            instance_id,
            predicate_and_page,
            status,
            tally,
            records,
            errors,
        }
    }

    /// The page could not even list its record ids
    pub fn failed(
        instance_id: impl Into<String>,
        predicate_and_page: PredicateAndPage,
        reason: impl Into<String>,
    ) -> Self {
        let instance_id = instance_id.into();
        Self {
            errors: vec![FailureEntry::structural(instance_id.clone(), reason)],
            instance_id,
            predicate_and_page,
            status: OutcomeStatus::Failed,
            tally: Tally::default(),
            records: Vec::new(),
        }
    }

    pub fn cancelled(instance_id: impl Into<String>, predicate_and_page: PredicateAndPage) -> Self {
        Self::from_records(instance_id, predicate_and_page, Vec::new(), true)
    }

    /// Failed as a whole rather than record by record
    pub fn is_structural_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed && self.errors.iter().any(|e| !e.is_record_failure())
    }
}

/// Result of one paging sub-workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
    pub instance_id: String,
    pub predicate: Predicate,
    /// Absent when the page count was never discovered
    pub page_count: Option<u32>,
    pub status: OutcomeStatus,
    pub tally: Tally,
    pub pages: Vec<PageSummary>,
    pub errors: Vec<FailureEntry>,
}

impl PartitionSummary {
    pub fn from_pages(
        instance_id: impl Into<String>,
        predicate: Predicate,
        page_count: u32,
        pages: Vec<PageSummary>,
        cancel_requested: bool,
    ) -> Self {
        let mut tally = Tally::default();
        let mut errors = Vec::new();
        for page in &pages {
            tally.merge(&page.tally);
            errors.extend(page.errors.iter().cloned());
        }
        let status =
            OutcomeStatus::from_children(pages.iter().map(|page| page.status), cancel_requested);

        Self {
            instance_id: instance_id.into(),
            predicate,
            page_count: Some(page_count),
            status,
            tally,
            pages,
            errors,
        }
    }

    /// Failed before any page ran
    pub fn is_structural_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed && self.page_count.is_none()
    }

    pub fn no_op(instance_id: impl Into<String>, predicate: Predicate) -> Self {
        Self::from_pages(instance_id, predicate, 0, Vec::new(), false)
    }

    pub fn failed(instance_id: impl Into<String>, predicate: Predicate, reason: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        Self {
            errors: vec![FailureEntry::structural(instance_id.clone(), reason)],
            instance_id,
            predicate,
            page_count: None,
            status: OutcomeStatus::Failed,
            tally: Tally::default(),
            pages: Vec::new(),
        }
    }

    pub fn cancelled(instance_id: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            instance_id: instance_id.into(),
            predicate,
            page_count: None,
            status: OutcomeStatus::Cancelled,
            tally: Tally::default(),
            pages: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// User-visible status of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    FullyMigrated,
    MigratedWithFailures {
        record_failures: usize,
        /// Pages that could not list their records
        page_failures: usize,
        /// Partitions that never got as far as paging
        partition_failures: usize,
    },
    /// Rejected before any work was scheduled
    Aborted { reason: String },
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullyMigrated => write!(f, "fully_migrated"),
            Self::MigratedWithFailures {
                record_failures,
                page_failures,
                partition_failures,
            } => write!(
                f,
                "migrated_with_failures({record_failures} records, {page_failures} pages, {partition_failures} partitions)"
            ),
            Self::Aborted { reason } => write!(f, "aborted: {reason}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a root orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub outcome: OutcomeStatus,
    pub tally: Tally,
    pub partitions: Vec<PartitionSummary>,
    pub errors: Vec<FailureEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn from_partitions(
        run_id: impl Into<String>,
        partitions: Vec<PartitionSummary>,
        cancel_requested: bool,
    ) -> Self {
        let mut tally = Tally::default();
        let mut errors = Vec::new();
        for partition in &partitions {
            tally.merge(&partition.tally);
            errors.extend(partition.errors.iter().cloned());
        }
        let outcome = OutcomeStatus::from_children(
            partitions.iter().map(|partition| partition.status),
            cancel_requested,
        );

        let status = if outcome == OutcomeStatus::Cancelled && cancel_requested {
            RunStatus::Cancelled
        } else if outcome.is_success() {
            RunStatus::FullyMigrated
        } else {
            RunStatus::MigratedWithFailures {
                record_failures: tally.failed,
                page_failures: partitions
                    .iter()
                    .flat_map(|partition| partition.pages.iter())
                    .filter(|page| page.is_structural_failure())
                    .count(),
                partition_failures: partitions
                    .iter()
                    .filter(|partition| partition.is_structural_failure())
                    .count(),
            }
        };

        Self {
            run_id: run_id.into(),
            status,
            outcome,
            tally,
            partitions,
            errors,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn aborted(run_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let run_id = run_id.into();
        let reason = reason.into();
        Self {
            errors: vec![FailureEntry::structural(run_id.clone(), reason.clone())],
            run_id,
            status: RunStatus::Aborted { reason },
            outcome: OutcomeStatus::Failed,
            tally: Tally::default(),
            partitions: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn cancelled(run_id: impl Into<String>) -> Self {
        Self::from_partitions(run_id, Vec::new(), true)
    }

    pub fn partition(&self, predicate: &Predicate) -> Option<&PartitionSummary> {
        self.partitions.iter().find(|p| &p.predicate == predicate)
    }
}
