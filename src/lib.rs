#![allow(clippy::doc_markdown)] // Allow technical terms like ETL, UUID in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Consolidation Migration
//!
//! Durable, replay-safe fan-out/fan-in orchestration that migrates consolidation orders
//! out of a paged legacy source into a target store.
//!
//! ## Overview
//!
//! A run is triggered with bounds (division codes × chapters). The root orchestration
//! partitions them into predicates and fans out one paging sub-workflow per predicate;
//! each paging sub-workflow discovers how many source pages exist and fans out one ETL
//! sub-workflow per page; each ETL sub-workflow migrates the lead records on its page,
//! one activity per record.
//!
//! ## Key Features
//!
//! - **Durable execution**: every orchestration instance keeps a step log; a restarted
//!   run replays recorded outcomes and only re-dispatches unfinished work
//! - **Deterministic identity**: child instance ids and target record ids are derived from
//!   natural keys, never randomized
//! - **Idempotent writes**: records are upserted by a name-based target id
//! - **Bounded parallelism**: a shared worker pool with per-attempt timeouts and
//!   exponential backoff
//! - **Tree cancellation**: cancelling an instance cancels its subtree, with a grace
//!   period for in-flight activities
//!
//! ## Module Organization
//!
//! - [`host`] - Orchestration host: step log, replay, worker pool, retries, cancellation
//! - [`orchestration`] - Root, paging and ETL orchestrations, activities, runner
//! - [`gateways`] - Source and target gateway traits with in-memory implementations
//! - [`models`] - Bounds, records and run summaries
//! - [`state_machine`] - Workflow lifecycle states
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consolidation_migration::gateways::{InMemorySourceGateway, InMemoryTargetStore};
//! use consolidation_migration::models::Bounds;
//! use consolidation_migration::orchestration::MigrationRunner;
//! use std::sync::Arc;
//!
//! # async fn example() -> consolidation_migration::Result<()> {
//! let runner = MigrationRunner::builder()
//!     .source(Arc::new(InMemorySourceGateway::new(10)))
//!     .target(Arc::new(InMemoryTargetStore::new()))
//!     .build()?;
//!
//! let summary = runner.run(Bounds::new(["000", "111"], ["11", "15"])).await?;
//! println!("{}", summary.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod gateways;
pub mod host;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use config::{BackoffConfig, ConfigManager, ExecutionConfig, MigrationConfig, SourceConfig};
pub use error::{MigrationError, Result};
pub use host::{InstanceId, OrchestrationHost};
pub use models::{
    Bounds, MigratedRecord, MigrationStatus, OutcomeStatus, Predicate, PredicateAndPage,
    RunStatus, RunSummary, SourceRecordId,
};
pub use orchestration::{parse_trigger, MigrationRunner};
