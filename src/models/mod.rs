pub mod bounds;
pub mod record;
pub mod summary;

// Re-export core models for easy access
pub use bounds::{Bounds, Predicate, PredicateAndPage};
pub use record::{
    format_case_id, parse_source_date, ConsolidationChildCase, ConsolidationOrder,
    ConsolidationType, MigratedRecord, MigrationStatus, SourceRecordId, TargetChildLink,
    TargetConsolidation,
};
pub use summary::{
    FailureEntry, OutcomeStatus, PageSummary, PartitionSummary, RunStatus, RunSummary, Tally,
};
