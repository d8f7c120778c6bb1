use super::{escalate, settled_event};
use crate::constants::{activities, orchestrations};
use crate::error::Result;
use crate::host::{Orchestration, OrchestrationContext};
use crate::models::{PageSummary, PartitionSummary, Predicate};
use crate::state_machine::{WorkflowEvent, WorkflowKind, WorkflowStateMachine};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

/// `Predicate -> PartitionSummary`
///
/// Discovers how many source pages the predicate spans and runs one ETL sub-workflow per
/// page. A page-count failure fails this partition only.
#[derive(Debug, Default)]
pub struct PagingOrchestration;

#[async_trait]
impl Orchestration for PagingOrchestration {
    async fn run(&self, ctx: OrchestrationContext, input: Value) -> Result<Value> {
        let predicate: Predicate = serde_json::from_value(input)?;
        let summary = migrate_partition(&ctx, predicate).await?;
        Ok(serde_json::to_value(summary)?)
    }
}

async fn migrate_partition(ctx: &OrchestrationContext, predicate: Predicate) -> Result<PartitionSummary> {
    let instance_id = ctx.instance_id().clone();
    let mut machine = WorkflowStateMachine::new(instance_id.as_str(), WorkflowKind::Paging);
    machine.transition(WorkflowEvent::Start)?;

    let page_count = match ctx
        .schedule_activity::<_, u32>(activities::GET_PAGE_COUNT, &predicate)
        .await
    {
        Ok(page_count) => page_count,
        Err(failure) if failure.is_cancelled() => {
            machine.transition(WorkflowEvent::Cancel)?;
            return Ok(PartitionSummary::cancelled(instance_id.as_str(), predicate));
        }
        Err(failure) => {
            warn!(instance_id = %instance_id, predicate = %predicate, failure = %failure, "Page count failed");
            machine.transition(WorkflowEvent::Fail(failure.to_string()))?;
            return Err(failure.into_error(activities::GET_PAGE_COUNT));
        }
    };

    machine.transition(WorkflowEvent::Discovered(page_count as usize))?;
    if page_count == 0 {
        debug!(instance_id = %instance_id, predicate = %predicate, "No pages, nothing to migrate");
        return Ok(PartitionSummary::no_op(instance_id.as_str(), predicate));
    }
    if ctx.is_cancelled() {
        machine.transition(WorkflowEvent::Cancel)?;
        return Ok(PartitionSummary::cancelled(instance_id.as_str(), predicate));
    }

    let mut keys = Vec::with_capacity(page_count as usize);
    let mut calls = Vec::with_capacity(page_count as usize);
    for page_number in 1..=page_count {
        let page = predicate.page(page_number)?;
        let child_id = instance_id.child(&[page_number.to_string().as_str()]);
        calls.push(ctx.schedule_sub_orchestration::<_, PageSummary>(
            orchestrations::ETL,
            child_id.clone(),
            &page,
        ));
        keys.push((page, child_id));
    }
    machine.transition(WorkflowEvent::FannedOut)?;

    let results = join_all(calls).await;
    let mut pages = Vec::with_capacity(results.len());
    for ((page, child_id), result) in keys.into_iter().zip(results) {
        let summary = match result {
            Ok(summary) => summary,
            Err(failure) if failure.is_cancelled() => PageSummary::cancelled(child_id.as_str(), page),
            Err(failure) => {
                escalate(&instance_id, &failure)?;
                PageSummary::failed(child_id.as_str(), page, failure.to_string())
            }
        };
        pages.push(summary);
    }

    let summary = PartitionSummary::from_pages(
        instance_id.as_str(),
        predicate,
        page_count,
        pages,
        ctx.is_cancelled(),
    );
    machine.transition(settled_event(summary.status))?;
    Ok(summary)
}
