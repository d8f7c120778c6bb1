use super::activities::derive_target_id;
use super::settled_event;
use crate::constants::activities;
use crate::error::Result;
use crate::host::{Orchestration, OrchestrationContext};
use crate::models::{MigratedRecord, PageSummary, PredicateAndPage, SourceRecordId};
use crate::state_machine::{WorkflowEvent, WorkflowKind, WorkflowStateMachine};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

/// `PredicateAndPage -> PageSummary`
///
/// Lists the lead records on one page and migrates each of them. A record failure is
/// captured against its source id; the other records on the page are unaffected.
#[derive(Debug, Default)]
pub struct EtlOrchestration;

#[async_trait]
impl Orchestration for EtlOrchestration {
    async fn run(&self, ctx: OrchestrationContext, input: Value) -> Result<Value> {
        let page: PredicateAndPage = serde_json::from_value(input)?;
        let summary = migrate_page(&ctx, page).await?;
        Ok(serde_json::to_value(summary)?)
    }
}

async fn migrate_page(ctx: &OrchestrationContext, page: PredicateAndPage) -> Result<PageSummary> {
    let instance_id = ctx.instance_id().clone();
    let mut machine = WorkflowStateMachine::new(instance_id.as_str(), WorkflowKind::Etl);
    machine.transition(WorkflowEvent::Start)?;

    let source_ids = match ctx
        .schedule_activity::<_, Vec<SourceRecordId>>(activities::GET_LEAD_RECORD_IDS, &page)
        .await
    {
        Ok(ids) => ids,
        Err(failure) if failure.is_cancelled() => {
            machine.transition(WorkflowEvent::Cancel)?;
            return Ok(PageSummary::cancelled(instance_id.as_str(), page));
        }
        Err(failure) => {
            warn!(instance_id = %instance_id, page = %page, failure = %failure, "Listing lead records failed");
            machine.transition(WorkflowEvent::Fail(failure.to_string()))?;
            return Err(failure.into_error(activities::GET_LEAD_RECORD_IDS));
        }
    };

    machine.transition(WorkflowEvent::Discovered(source_ids.len()))?;
    if source_ids.is_empty() {
        return Ok(PageSummary::from_records(instance_id.as_str(), page, Vec::new(), false));
    }

    let calls: Vec<_> = source_ids
        .iter()
        .map(|source_id| ctx.schedule_activity::<_, MigratedRecord>(activities::MIGRATE_RECORD, source_id))
        .collect();
    machine.transition(WorkflowEvent::FannedOut)?;

    let results = join_all(calls).await;
    let records: Vec<MigratedRecord> = source_ids
        .into_iter()
        .zip(results)
        .map(|(source_id, result)| match result {
            Ok(record) => record,
            Err(failure) if failure.is_cancelled() => {
                let target_id = derive_target_id(&source_id);
                MigratedRecord::cancelled(source_id, target_id)
            }
            Err(failure) => {
                let target_id = derive_target_id(&source_id);
                MigratedRecord::failed(source_id, target_id, failure.message)
            }
        })
        .collect();

    let summary = PageSummary::from_records(instance_id.as_str(), page, records, ctx.is_cancelled());
    info!(
        instance_id = %instance_id,
        status = %summary.status,
        migrated = summary.tally.migrated,
        failed = summary.tally.failed,
        cancelled = summary.tally.cancelled,
        "Page settled"
    );
    machine.transition(settled_event(summary.status))?;
    Ok(summary)
}
