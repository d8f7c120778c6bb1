//! # System Constants
//!
//! Names and fixed values shared by the orchestration tree. Orchestration and activity
//! names are recorded in instance histories, so renaming one breaks replay of any
//! history written under the old name.

use uuid::Uuid;

/// Operational defaults
pub mod system {
    /// Lead records per source page
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// Joins a parent instance id to a child's natural key. Bounds values may not contain it.
    pub const CHILD_ID_SEPARATOR: char = ':';

    /// Raw source case numbers are left-padded to this width before formatting
    pub const CASE_ID_WIDTH: usize = 10;
}

/// Registered orchestration names
pub mod orchestrations {
    pub const ROOT: &str = "migrate_consolidation_orders";
    pub const PAGING: &str = "paging_sub_workflow";
    pub const ETL: &str = "etl_sub_workflow";
}

/// Registered activity names
pub mod activities {
    pub const GET_PAGE_COUNT: &str = "get_page_count";
    pub const GET_LEAD_RECORD_IDS: &str = "get_lead_record_ids";
    pub const MIGRATE_RECORD: &str = "migrate_record";
}

/// Structured log event names
pub mod events {
    pub const WORKFLOW_TRANSITION: &str = "workflow.transition";
    pub const WORKFLOW_REATTACHED: &str = "workflow.reattached";
    pub const ACTIVITY_STARTED: &str = "activity.started";
    pub const ACTIVITY_COMPLETED: &str = "activity.completed";
    pub const ACTIVITY_RETRY_SCHEDULED: &str = "activity.retry_scheduled";
    pub const ACTIVITY_FAILED: &str = "activity.failed";
    pub const ACTIVITY_ABANDONED: &str = "activity.abandoned";
}

/// Namespace under which target ids are derived from source ids
pub const TARGET_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2c8e_4b7a_5d39_9e0c_a1b2_c3d4_e5f6);
