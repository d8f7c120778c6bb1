//! # Gateways
//!
//! Narrow interfaces to the systems the migration reads from and writes to. The
//! orchestration tree only ever talks to these traits; in-memory implementations are
//! provided for dry runs and tests.

pub mod mapper;
pub mod memory;

use crate::error::Result;
use crate::models::{ConsolidationOrder, Predicate, PredicateAndPage, SourceRecordId, TargetConsolidation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use mapper::ConsolidationOrderMapper;
pub use memory::{InMemorySourceGateway, InMemoryTargetStore, SourceRow};

/// Paged, predicate-filtered query surface of the legacy source
#[async_trait]
pub trait SourceGateway: Send + Sync + 'static {
    /// Number of pages of lead records matching the predicate
    async fn page_count(&self, predicate: &Predicate) -> Result<u32>;

    /// Lead record ids on one page
    async fn lead_record_ids(&self, page: &PredicateAndPage) -> Result<Vec<SourceRecordId>>;

    /// Full consolidation order for one lead record
    async fn fetch_record(&self, source_id: &SourceRecordId) -> Result<ConsolidationOrder>;
}

/// What an upsert did to the target store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    /// An identical record was already present
    Unchanged,
    /// A different record was present and has been overwritten
    Replaced,
}

/// Target persistence, idempotent by target id
#[async_trait]
pub trait TargetGateway: Send + Sync + 'static {
    async fn find(&self, target_id: Uuid) -> Result<Option<TargetConsolidation>>;

    /// Insert when absent, no-op when identical, overwrite when different.
    /// May fail with `TargetWriteConflict` if another writer races on the same id.
    async fn upsert(&self, record: &TargetConsolidation) -> Result<UpsertOutcome>;
}

/// Transforms a source consolidation order into its target representation
pub trait RecordMapper: Send + Sync + 'static {
    fn map(
        &self,
        target_id: Uuid,
        source_id: &SourceRecordId,
        order: &ConsolidationOrder,
    ) -> Result<TargetConsolidation>;
}
