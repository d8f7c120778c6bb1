//! # In-Memory Gateways
//!
//! Source and target implementations backed by process memory. They reproduce the
//! legacy source's query semantics (chapter normalization, descending paging, lead case
//! exclusion) and support failure injection and call counting for tests.

use super::{SourceGateway, TargetGateway, UpsertOutcome};
use crate::config::SourceConfig;
use crate::constants::system::DEFAULT_PAGE_SIZE;
use crate::error::{MigrationError, Result};
use crate::models::{
    format_case_id, parse_source_date, ConsolidationChildCase, ConsolidationOrder,
    ConsolidationType, Predicate, PredicateAndPage, SourceRecordId, TargetConsolidation,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// One raw row of the legacy consolidation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub division_code: String,
    /// Raw chapter as stored, e.g. `7A`, `09`, `11`
    pub chapter: String,
    /// Raw case number of the lead case this row is consolidated into
    pub lead_case_number: String,
    pub case_number: String,
    /// `S` for substantive, anything else for administrative
    pub consolidation_type: String,
    /// `YYYYMMDD`
    pub consolidation_date: String,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    error: MigrationError,
    /// `None` fails forever
    remaining: Option<usize>,
}

/// Normalize a requested chapter into the raw chapters it matches
fn raw_chapters(chapter: &str) -> Vec<String> {
    let chapter = chapter.trim();
    if chapter == "7" {
        vec!["7A".to_string(), "7N".to_string()]
    } else {
        vec![format!("{chapter:0>2}")]
    }
}

fn page_count_key(predicate: &Predicate) -> String {
    format!("page_count:{predicate}")
}

fn lead_record_ids_key(page: &PredicateAndPage) -> String {
    format!("lead_record_ids:{page}")
}

fn fetch_key(source_id: &SourceRecordId) -> String {
    format!("fetch_record:{source_id}")
}

/// Source gateway over an in-memory table of [`SourceRow`]s
#[derive(Debug)]
pub struct InMemorySourceGateway {
    rows: RwLock<Vec<SourceRow>>,
    page_size: u32,
    failures: DashMap<String, InjectedFailure>,
    calls: DashMap<String, usize>,
    fetch_delay: RwLock<Option<Duration>>,
}

impl Default for InMemorySourceGateway {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl InMemorySourceGateway {
    pub fn new(page_size: u32) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            page_size: page_size.max(1),
            failures: DashMap::new(),
            calls: DashMap::new(),
            fetch_delay: RwLock::new(None),
        }
    }

    /// Source paged the way the loaded configuration says
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.page_size)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn insert_row(&self, row: SourceRow) {
        self.rows.write().push(row);
    }

    /// Add a lead case plus its children. The lead's own row is added too, the way the
    /// legacy table stores it.
    pub fn add_consolidation(
        &self,
        division_code: &str,
        chapter: &str,
        lead_case_number: &str,
        children: &[(&str, &str, &str)],
    ) {
        let mut rows = self.rows.write();
        rows.push(SourceRow {
            division_code: division_code.to_string(),
            chapter: chapter.to_string(),
            lead_case_number: lead_case_number.to_string(),
            case_number: lead_case_number.to_string(),
            consolidation_type: "A".to_string(),
            consolidation_date: children
                .first()
                .map(|(_, _, date)| date.to_string())
                .unwrap_or_else(|| "20200101".to_string()),
        });
        for (case_number, consolidation_type, consolidation_date) in children {
            rows.push(SourceRow {
                division_code: division_code.to_string(),
                chapter: chapter.to_string(),
                lead_case_number: lead_case_number.to_string(),
                case_number: case_number.to_string(),
                consolidation_type: consolidation_type.to_string(),
                consolidation_date: consolidation_date.to_string(),
            });
        }
    }

    /// Fail `page_count` for a predicate; `times = None` fails forever
    pub fn fail_page_count(&self, predicate: &Predicate, error: MigrationError, times: Option<usize>) {
        self.inject(page_count_key(predicate), error, times);
    }

    pub fn fail_lead_record_ids(&self, page: &PredicateAndPage, error: MigrationError, times: Option<usize>) {
        self.inject(lead_record_ids_key(page), error, times);
    }

    pub fn fail_fetch(&self, source_id: &SourceRecordId, error: MigrationError, times: Option<usize>) {
        self.inject(fetch_key(source_id), error, times);
    }

    /// Make every `fetch_record` call sleep before answering
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.write() = delay;
    }

    pub fn page_count_calls(&self, predicate: &Predicate) -> usize {
        self.call_count(&page_count_key(predicate))
    }

    pub fn lead_record_ids_calls(&self, page: &PredicateAndPage) -> usize {
        self.call_count(&lead_record_ids_key(page))
    }

    pub fn fetch_calls(&self, source_id: &SourceRecordId) -> usize {
        self.call_count(&fetch_key(source_id))
    }

    pub fn total_fetch_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|entry| entry.key().starts_with("fetch_record:"))
            .map(|entry| *entry.value())
            .sum()
    }

    fn call_count(&self, key: &str) -> usize {
        self.calls.get(key).map(|count| *count).unwrap_or(0)
    }

    fn inject(&self, key: String, error: MigrationError, remaining: Option<usize>) {
        self.failures.insert(key, InjectedFailure { error, remaining });
    }

    /// Count the call, then surface an injected failure if one is armed
    fn check(&self, key: String) -> Result<()> {
        *self.calls.entry(key.clone()).or_insert(0) += 1;

        if let Entry::Occupied(mut entry) = self.failures.entry(key) {
            let error = entry.get().error.clone();
            match entry.get().remaining {
                None => return Err(error),
                Some(0) => {
                    entry.remove();
                }
                Some(1) => {
                    entry.remove();
                    return Err(error);
                }
                Some(n) => {
                    entry.get_mut().remaining = Some(n - 1);
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Distinct lead case numbers matching the predicate, highest first
    fn lead_case_numbers(&self, predicate: &Predicate) -> Vec<String> {
        let chapters = raw_chapters(&predicate.chapter);
        let rows = self.rows.read();
        let leads: BTreeSet<String> = rows
            .iter()
            .filter(|row| row.division_code == predicate.division_code)
            .filter(|row| chapters.iter().any(|chapter| chapter == &row.chapter))
            .filter(|row| row.lead_case_number != "0")
            .map(|row| row.lead_case_number.clone())
            .collect();
        leads.into_iter().rev().collect()
    }
}

#[async_trait]
impl SourceGateway for InMemorySourceGateway {
    async fn page_count(&self, predicate: &Predicate) -> Result<u32> {
        self.check(page_count_key(predicate))?;
        let leads = self.lead_case_numbers(predicate).len() as u32;
        Ok(leads.div_ceil(self.page_size))
    }

    async fn lead_record_ids(&self, page: &PredicateAndPage) -> Result<Vec<SourceRecordId>> {
        self.check(lead_record_ids_key(page))?;
        let ids = self
            .lead_case_numbers(page.predicate())
            .into_iter()
            .skip(page.offset(self.page_size))
            .take(self.page_size as usize)
            .map(SourceRecordId::from)
            .collect();
        Ok(ids)
    }

    async fn fetch_record(&self, source_id: &SourceRecordId) -> Result<ConsolidationOrder> {
        self.check(fetch_key(source_id))?;

        let delay = *self.fetch_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let rows: Vec<SourceRow> = self
            .rows
            .read()
            .iter()
            .filter(|row| row.lead_case_number == source_id.as_str())
            .cloned()
            .collect();
        if rows.is_empty() {
            return Err(MigrationError::SourceRecordNotFound {
                source_id: source_id.to_string(),
            });
        }

        let lead_case_id = format_case_id(source_id.as_str());
        let child_cases = rows
            .iter()
            .map(|row| {
                Ok(ConsolidationChildCase {
                    case_id: format_case_id(&row.case_number),
                    consolidation_type: ConsolidationType::from_source_code(&row.consolidation_type),
                    consolidation_date: parse_source_date(&row.consolidation_date).map_err(|e| {
                        MigrationError::permanent(source_id.as_str(), e.to_string())
                    })?,
                })
            })
            .filter(|child: &Result<ConsolidationChildCase>| {
                child.as_ref().map(|c| c.case_id != lead_case_id).unwrap_or(true)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            source_id = %source_id,
            child_cases = child_cases.len(),
            "Fetched consolidation order"
        );

        Ok(ConsolidationOrder {
            lead_case_id,
            child_cases,
        })
    }
}

/// Target store keyed by target id
#[derive(Debug, Default)]
pub struct InMemoryTargetStore {
    records: DashMap<Uuid, TargetConsolidation>,
    conflicts: DashMap<Uuid, usize>,
    upserts: DashMap<Uuid, usize>,
}

impl InMemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` upserts for this id fail with a write conflict. The
    /// conflicting write still lands, as if another writer had won the race.
    pub fn inject_conflicts(&self, target_id: Uuid, times: usize) {
        self.conflicts.insert(target_id, times);
    }

    /// Seed a record directly, bypassing upsert accounting
    pub fn seed(&self, record: TargetConsolidation) {
        self.records.insert(record.target_id, record);
    }

    pub fn get(&self, target_id: &Uuid) -> Option<TargetConsolidation> {
        self.records.get(target_id).map(|record| record.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> Vec<TargetConsolidation> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn upsert_calls(&self, target_id: &Uuid) -> usize {
        self.upserts.get(target_id).map(|count| *count).unwrap_or(0)
    }

    fn take_conflict(&self, target_id: Uuid) -> bool {
        match self.conflicts.entry(target_id) {
            Entry::Occupied(mut entry) if *entry.get() > 0 => {
                *entry.get_mut() -= 1;
                true
            }
            Entry::Occupied(entry) => {
                entry.remove();
                false
            }
            Entry::Vacant(_) => false,
        }
    }
}

#[async_trait]
impl TargetGateway for InMemoryTargetStore {
    async fn find(&self, target_id: Uuid) -> Result<Option<TargetConsolidation>> {
        Ok(self.get(&target_id))
    }

    async fn upsert(&self, record: &TargetConsolidation) -> Result<UpsertOutcome> {
        *self.upserts.entry(record.target_id).or_insert(0) += 1;

        if self.take_conflict(record.target_id) {
            self.records.insert(record.target_id, record.clone());
            return Err(MigrationError::TargetWriteConflict {
                target_id: record.target_id.to_string(),
            });
        }

        let outcome = match self.records.entry(record.target_id) {
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                UpsertOutcome::Inserted
            }
            Entry::Occupied(entry) if entry.get() == record => UpsertOutcome::Unchanged,
            Entry::Occupied(mut entry) => {
                entry.insert(record.clone());
                UpsertOutcome::Replaced
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_with_leads(division: &str, chapter: &str, leads: usize) -> InMemorySourceGateway {
        let gateway = InMemorySourceGateway::new(10);
        for n in 0..leads {
            let lead = format!("{division}23{n:05}");
            let child = format!("{division}23{:05}", 50_000 + n);
            gateway.add_consolidation(division, chapter, &lead, &[(&child, "S", "20230105")]);
        }
        gateway
    }

    #[tokio::test]
    async fn test_page_count_rounds_up() {
        let gateway = gateway_with_leads("081", "11", 21);
        let predicate = Predicate::new("081", "11");
        assert_eq!(gateway.page_count(&predicate).await.unwrap(), 3);
        assert_eq!(
            gateway.page_count(&Predicate::new("081", "15")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_pages_are_descending_and_disjoint() {
        let gateway = gateway_with_leads("081", "11", 12);
        let predicate = Predicate::new("081", "11");
        let first = gateway
            .lead_record_ids(&predicate.page(1).unwrap())
            .await
            .unwrap();
        let second = gateway
            .lead_record_ids(&predicate.page(2).unwrap())
            .await
            .unwrap();

        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 2);
        assert_eq!(first[0].as_str(), "0812300011");
        assert_eq!(second[1].as_str(), "0812300000");
    }

    #[tokio::test]
    async fn test_chapter_normalization() {
        let gateway = InMemorySourceGateway::new(10);
        gateway.add_consolidation("081", "7A", "0812300001", &[]);
        gateway.add_consolidation("081", "7N", "0812300002", &[]);
        gateway.add_consolidation("081", "09", "0812300003", &[]);

        let seven = gateway
            .lead_record_ids(&Predicate::new("081", "7").page(1).unwrap())
            .await
            .unwrap();
        assert_eq!(seven.len(), 2);

        let nine = gateway
            .lead_record_ids(&Predicate::new("081", "9").page(1).unwrap())
            .await
            .unwrap();
        assert_eq!(nine, vec![SourceRecordId::from("0812300003")]);
    }

    #[tokio::test]
    async fn test_fetch_excludes_lead_and_formats_ids() {
        let gateway = InMemorySourceGateway::new(10);
        gateway.add_consolidation(
            "081",
            "11",
            "812300001",
            &[("812300002", "S", "20230105"), ("812300003", "A", "20230210")],
        );

        let order = gateway
            .fetch_record(&SourceRecordId::from("812300001"))
            .await
            .unwrap();
        assert_eq!(order.lead_case_id, "081-23-00001");
        assert_eq!(order.child_cases.len(), 2);
        assert_eq!(order.child_cases[0].case_id, "081-23-00002");
        assert_eq!(
            order.child_cases[0].consolidation_type,
            ConsolidationType::Substantive
        );
        assert_eq!(
            order.child_cases[1].consolidation_type,
            ConsolidationType::Administrative
        );

        let missing = gateway.fetch_record(&SourceRecordId::from("404")).await;
        assert!(matches!(
            missing,
            Err(MigrationError::SourceRecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_injection_runs_out() {
        let gateway = gateway_with_leads("081", "11", 1);
        let predicate = Predicate::new("081", "11");
        gateway.fail_page_count(
            &predicate,
            MigrationError::transient("page_count", "connection reset"),
            Some(2),
        );

        assert!(gateway.page_count(&predicate).await.is_err());
        assert!(gateway.page_count(&predicate).await.is_err());
        assert_eq!(gateway.page_count(&predicate).await.unwrap(), 1);
        assert_eq!(gateway.page_count_calls(&predicate), 3);
    }

    #[tokio::test]
    async fn test_target_upsert_outcomes() {
        let store = InMemoryTargetStore::new();
        let mut record = TargetConsolidation {
            target_id: Uuid::nil(),
            source_id: SourceRecordId::from("1"),
            lead_case_id: "000-00-00001".to_string(),
            child_cases: vec![],
        };

        assert_eq!(store.upsert(&record).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&record).await.unwrap(), UpsertOutcome::Unchanged);
        record.lead_case_id = "000-00-00002".to_string();
        assert_eq!(store.upsert(&record).await.unwrap(), UpsertOutcome::Replaced);
        assert_eq!(store.len(), 1);
        assert_eq!(store.upsert_calls(&Uuid::nil()), 3);
    }
}
