//! # Migration Activities
//!
//! The side-effecting leaves of the orchestration tree. Every activity is registered on
//! the host under a name from [`crate::constants::activities`] and may run more than once
//! for the same input, so each one is idempotent.

use crate::constants::TARGET_ID_NAMESPACE;
use crate::error::{MigrationError, Result};
use crate::gateways::{RecordMapper, SourceGateway, TargetGateway, UpsertOutcome};
use crate::host::Activity;
use crate::models::{MigratedRecord, Predicate, PredicateAndPage, SourceRecordId, TargetConsolidation};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stable target id for a source record: the same source id always maps to the same
/// target id, across runs and processes.
pub fn derive_target_id(source_id: &SourceRecordId) -> Uuid {
    Uuid::new_v5(&TARGET_ID_NAMESPACE, source_id.as_str().as_bytes())
}

/// `Predicate -> u32`
pub struct GetPageCountActivity {
    source: Arc<dyn SourceGateway>,
}

impl GetPageCountActivity {
    pub fn new(source: Arc<dyn SourceGateway>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Activity for GetPageCountActivity {
    async fn execute(&self, input: Value) -> Result<Value> {
        let predicate: Predicate = serde_json::from_value(input)?;
        let pages = self.source.page_count(&predicate).await?;
        debug!(predicate = %predicate, pages = pages, "Discovered page count");
        Ok(serde_json::to_value(pages)?)
    }
}

/// `PredicateAndPage -> Vec<SourceRecordId>`
pub struct GetLeadRecordIdsActivity {
    source: Arc<dyn SourceGateway>,
}

impl GetLeadRecordIdsActivity {
    pub fn new(source: Arc<dyn SourceGateway>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Activity for GetLeadRecordIdsActivity {
    async fn execute(&self, input: Value) -> Result<Value> {
        let page: PredicateAndPage = serde_json::from_value(input)?;
        let ids = self.source.lead_record_ids(&page).await?;
        debug!(page = %page, leads = ids.len(), "Fetched lead record ids");
        Ok(serde_json::to_value(ids)?)
    }
}

/// `SourceRecordId -> MigratedRecord`
///
/// Fetch, map, upsert by the derived target id. Running it again for the same source id
/// converges on the same target record.
pub struct MigrateRecordActivity {
    source: Arc<dyn SourceGateway>,
    target: Arc<dyn TargetGateway>,
    mapper: Arc<dyn RecordMapper>,
}

impl MigrateRecordActivity {
    pub fn new(
        source: Arc<dyn SourceGateway>,
        target: Arc<dyn TargetGateway>,
        mapper: Arc<dyn RecordMapper>,
    ) -> Self {
        Self {
            source,
            target,
            mapper,
        }
    }

    pub async fn migrate(&self, source_id: &SourceRecordId) -> Result<MigratedRecord> {
        let order = self.source.fetch_record(source_id).await?;
        let target_id = derive_target_id(source_id);
        let record = self.mapper.map(target_id, source_id, &order)?;

        let outcome = self.write(&record).await?;
        info!(
            source_id = %source_id,
            target_id = %target_id,
            outcome = ?outcome,
            child_cases = record.child_cases.len(),
            "Migrated consolidation order"
        );

        Ok(MigratedRecord::migrated(
            source_id.clone(),
            target_id,
            record.child_cases.len(),
            Utc::now(),
        ))
    }

    async fn write(&self, record: &TargetConsolidation) -> Result<UpsertOutcome> {
        match self.target.upsert(record).await {
            Ok(UpsertOutcome::Replaced) => {
                self.verify(record).await?;
                Ok(UpsertOutcome::Replaced)
            }
            Ok(outcome) => Ok(outcome),
            Err(MigrationError::TargetWriteConflict { target_id }) => {
                // Another writer got there first; fine if it wrote the same thing
                match self.target.find(record.target_id).await? {
                    Some(existing) if &existing == record => Ok(UpsertOutcome::Unchanged),
                    _ => {
                        warn!(target_id = %target_id, "Conflicting target write");
                        Err(MigrationError::TargetWriteConflict { target_id })
                    }
                }
            }
            Err(error) => Err(error),
        }
    }

    async fn verify(&self, record: &TargetConsolidation) -> Result<()> {
        match self.target.find(record.target_id).await? {
            Some(stored) if &stored == record => Ok(()),
            _ => Err(MigrationError::TargetWriteConflict {
                target_id: record.target_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Activity for MigrateRecordActivity {
    async fn execute(&self, input: Value) -> Result<Value> {
        let source_id: SourceRecordId = serde_json::from_value(input)?;
        let record = self.migrate(&source_id).await?;
        Ok(serde_json::to_value(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::{ConsolidationOrderMapper, InMemorySourceGateway, InMemoryTargetStore};
    use crate::models::MigrationStatus;

    fn fixture() -> (Arc<InMemorySourceGateway>, Arc<InMemoryTargetStore>, MigrateRecordActivity) {
        let source = Arc::new(InMemorySourceGateway::new(10));
        source.add_consolidation(
            "081",
            "11",
            "0812300001",
            &[("0812300002", "S", "20230301"), ("0812300003", "A", "20230302")],
        );
        let target = Arc::new(InMemoryTargetStore::new());
        let activity = MigrateRecordActivity::new(
            source.clone(),
            target.clone(),
            Arc::new(ConsolidationOrderMapper),
        );
        (source, target, activity)
    }

    #[test]
    fn test_target_id_is_stable() {
        let id = SourceRecordId::from("0812300001");
        assert_eq!(derive_target_id(&id), derive_target_id(&id));
        assert_ne!(derive_target_id(&id), derive_target_id(&SourceRecordId::from("0812300002")));
        assert_eq!(derive_target_id(&id).get_version_num(), 5);
    }

    #[tokio::test]
    async fn test_migrate_twice_writes_one_record() {
        let (_source, target, activity) = fixture();
        let id = SourceRecordId::from("0812300001");

        let first = activity.migrate(&id).await.unwrap();
        let second = activity.migrate(&id).await.unwrap();

        assert_eq!(first.status, MigrationStatus::Migrated);
        assert_eq!(first.target_id, second.target_id);
        assert_eq!(first.child_case_count, 2);
        assert_eq!(target.len(), 1);
        assert_eq!(target.upsert_calls(&first.target_id), 2);
    }

    #[tokio::test]
    async fn test_conflict_with_identical_record_is_success() {
        let (_source, target, activity) = fixture();
        let id = SourceRecordId::from("0812300001");
        target.inject_conflicts(derive_target_id(&id), 1);

        let record = activity.migrate(&id).await.unwrap();
        assert_eq!(record.status, MigrationStatus::Migrated);
        assert_eq!(target.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_record_is_reported() {
        let (_source, _target, activity) = fixture();
        let result = activity.migrate(&SourceRecordId::from("0819999999")).await;
        assert!(matches!(
            result,
            Err(MigrationError::SourceRecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_page_count_activity_decodes_predicate() {
        let (source, _target, _activity) = fixture();
        let activity = GetPageCountActivity::new(source);
        let output = activity
            .execute(serde_json::to_value(Predicate::new("081", "11")).unwrap())
            .await
            .unwrap();
        assert_eq!(output, serde_json::json!(1));

        let bad = activity.execute(serde_json::json!("not a predicate")).await;
        assert!(matches!(bad, Err(MigrationError::InvalidInput(_))));
    }
}
