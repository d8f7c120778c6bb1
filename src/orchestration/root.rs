use super::{escalate, partitioner, settled_event};
use crate::constants::orchestrations;
use crate::error::Result;
use crate::host::{Orchestration, OrchestrationContext};
use crate::models::{Bounds, PartitionSummary, RunSummary};
use crate::state_machine::{WorkflowEvent, WorkflowKind, WorkflowStateMachine};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::info;

/// `Bounds -> RunSummary`
///
/// Partitions the bounds and runs one paging sub-workflow per predicate.
#[derive(Debug, Default)]
pub struct RootOrchestration;

#[async_trait]
impl Orchestration for RootOrchestration {
    async fn run(&self, ctx: OrchestrationContext, input: Value) -> Result<Value> {
        let bounds: Bounds = serde_json::from_value(input)?;
        let summary = migrate_bounds(&ctx, &bounds).await?;
        Ok(serde_json::to_value(summary)?)
    }
}

async fn migrate_bounds(ctx: &OrchestrationContext, bounds: &Bounds) -> Result<RunSummary> {
    let instance_id = ctx.instance_id().clone();
    let mut machine = WorkflowStateMachine::new(instance_id.as_str(), WorkflowKind::Root);
    machine.transition(WorkflowEvent::Start)?;

    let predicates = match partitioner::flatten(bounds) {
        Ok(predicates) => predicates,
        Err(error) => {
            machine.transition(WorkflowEvent::Fail(error.to_string()))?;
            return Err(error);
        }
    };
    machine.transition(WorkflowEvent::Discovered(predicates.len()))?;

    if ctx.is_cancelled() {
        machine.transition(WorkflowEvent::Cancel)?;
        return Ok(RunSummary::cancelled(instance_id.as_str()));
    }

    let children: Vec<_> = predicates
        .iter()
        .map(|predicate| {
            let child_id = instance_id.child(&[predicate.division_code.as_str(), predicate.chapter.as_str()]);
            let call = ctx.schedule_sub_orchestration::<_, PartitionSummary>(
                orchestrations::PAGING,
                child_id.clone(),
                predicate,
            );
            (predicate.clone(), child_id, call)
        })
        .collect();
    machine.transition(WorkflowEvent::FannedOut)?;
    info!(
        instance_id = %instance_id,
        partitions = children.len(),
        "Fanned out paging sub-workflows"
    );

    let (keys, calls): (Vec<_>, Vec<_>) = children
        .into_iter()
        .map(|(predicate, child_id, call)| ((predicate, child_id), call))
        .unzip();
    let results = join_all(calls).await;

    let mut partitions = Vec::with_capacity(results.len());
    for ((predicate, child_id), result) in keys.into_iter().zip(results) {
        let partition = match result {
            Ok(partition) => partition,
            Err(failure) if failure.is_cancelled() => {
                PartitionSummary::cancelled(child_id.as_str(), predicate)
            }
            Err(failure) => {
                escalate(&instance_id, &failure)?;
                PartitionSummary::failed(child_id.as_str(), predicate, failure.to_string())
            }
        };
        partitions.push(partition);
    }

    let summary = RunSummary::from_partitions(instance_id.as_str(), partitions, ctx.is_cancelled());
    machine.transition(settled_event(summary.outcome))?;
    Ok(summary)
}
