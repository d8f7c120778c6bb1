//! # Record Models
//!
//! Source consolidation orders, their target representation, and the per-record
//! migration result.

use crate::constants::system::CASE_ID_WIDTH;
use crate::error::MigrationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a lead record in the source system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecordId(String);

impl SourceRecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceRecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SourceRecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Migration status of a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    Migrated,
    Failed,
    /// Abandoned by a cancellation before it could finish
    Cancelled,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Migrated => write!(f, "migrated"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of migrating one lead record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedRecord {
    pub source_id: SourceRecordId,
    pub target_id: Uuid,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub child_case_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigratedRecord {
    pub fn pending(source_id: SourceRecordId, target_id: Uuid) -> Self {
        Self {
            source_id,
            target_id,
            status: MigrationStatus::Pending,
            migrated_at: None,
            child_case_count: 0,
            error: None,
        }
    }

    pub fn migrated(
        source_id: SourceRecordId,
        target_id: Uuid,
        child_case_count: usize,
        migrated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: MigrationStatus::Migrated,
            migrated_at: Some(migrated_at),
            child_case_count,
            ..Self::pending(source_id, target_id)
        }
    }

    pub fn failed(source_id: SourceRecordId, target_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            status: MigrationStatus::Failed,
            error: Some(error.into()),
            ..Self::pending(source_id, target_id)
        }
    }

    pub fn cancelled(source_id: SourceRecordId, target_id: Uuid) -> Self {
        Self {
            status: MigrationStatus::Cancelled,
            ..Self::pending(source_id, target_id)
        }
    }
}

/// How a child case was consolidated into its lead case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationType {
    Substantive,
    Administrative,
}

impl ConsolidationType {
    /// The source marks substantive consolidations with `S`; anything else is administrative
    pub fn from_source_code(code: &str) -> Self {
        if code.trim() == "S" {
            Self::Substantive
        } else {
            Self::Administrative
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationChildCase {
    pub case_id: String,
    pub consolidation_type: ConsolidationType,
    pub consolidation_date: NaiveDate,
}

/// A lead case and the child cases consolidated into it, as read from the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationOrder {
    pub lead_case_id: String,
    pub child_cases: Vec<ConsolidationChildCase>,
}

/// Link from a lead case to one child case in the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetChildLink {
    pub case_id: String,
    pub consolidation_type: ConsolidationType,
    pub order_date: NaiveDate,
}

/// The record written to the target store, keyed by `target_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConsolidation {
    pub target_id: Uuid,
    pub source_id: SourceRecordId,
    pub lead_case_id: String,
    pub child_cases: Vec<TargetChildLink>,
}

/// Render a raw source case number as `DDD-YY-NNNNN`
pub fn format_case_id(raw: &str) -> String {
    let padded = format!("{:0>width$}", raw.trim(), width = CASE_ID_WIDTH);
    match (padded.get(..3), padded.get(3..5), padded.get(5..)) {
        (Some(division), Some(year), Some(number)) => format!("{division}-{year}-{number}"),
        _ => padded,
    }
}

/// Parse a `YYYYMMDD` source date
pub fn parse_source_date(raw: &str) -> Result<NaiveDate, MigrationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d")
        .map_err(|e| MigrationError::InvalidInput(format!("bad source date '{raw}': {e}")))
}
