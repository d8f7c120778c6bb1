//! # Migration Orchestration
//!
//! The three-level fan-out/fan-in tree that migrates consolidation orders, built on the
//! durable [`crate::host`].
//!
//! ## Tree
//!
//! ```text
//! Root ──flatten(bounds)──▶ Paging {parent}:{divisionCode}:{chapter}   (one per predicate)
//!                              └─page_count──▶ ETL {parent}:{pageNumber} (one per page)
//!                                                └─lead_record_ids──▶ migrate_record (one per id)
//! ```
//!
//! ## Core Components
//!
//! - **partitioner**: bounds → ordered predicates
//! - **root / paging / etl**: deterministic orchestrator bodies; they reach the outside
//!   world only through the context
//! - **activities**: page count, lead record ids, record migration
//! - **error_classifier**: maps errors to retry decisions and recorded failure codes
//! - **runner**: wires gateways, configuration and the host together
//! - **trigger**: JSON trigger payload → bounds
//!
//! Fan-in is collect-then-decide at every level: a failed child is recorded in the
//! parent's summary and its siblings carry on.

pub mod activities;
pub mod error_classifier;
pub mod etl;
pub mod paging;
pub mod partitioner;
pub mod root;
pub mod runner;
pub mod trigger;

pub use activities::{
    derive_target_id, GetLeadRecordIdsActivity, GetPageCountActivity, MigrateRecordActivity,
};
pub use error_classifier::{
    ErrorCategory, ErrorClassification, ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
pub use etl::EtlOrchestration;
pub use paging::PagingOrchestration;
pub use partitioner::flatten;
pub use root::RootOrchestration;
pub use runner::{MigrationRunner, MigrationRunnerBuilder};
pub use trigger::parse_trigger;

use crate::error::{MigrationError, Result};
use crate::host::{InstanceId, TaskFailure};
use crate::models::OutcomeStatus;
use crate::state_machine::WorkflowEvent;

/// A child failure that must fail the parent too instead of being folded into its summary
pub(crate) fn escalate(instance_id: &InstanceId, failure: &TaskFailure) -> Result<()> {
    if failure.category == ErrorCategory::StateInconsistency {
        return Err(MigrationError::replay_inconsistency(
            instance_id.as_str(),
            failure.message.clone(),
        ));
    }
    Ok(())
}

/// Closing lifecycle event once every child has reported back
pub(crate) fn settled_event(status: OutcomeStatus) -> WorkflowEvent {
    match status {
        OutcomeStatus::Cancelled => WorkflowEvent::Cancel,
        OutcomeStatus::Failed => WorkflowEvent::Fail("every child failed".to_string()),
        _ => WorkflowEvent::Settled,
    }
}
