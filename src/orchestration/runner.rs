//! # Migration Runner
//!
//! Entry point for a migration run: registers the orchestrations and activities on a
//! host configured from [`MigrationConfig`] and turns the root outcome into a
//! [`RunSummary`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consolidation_migration::config::MigrationConfig;
//! use consolidation_migration::gateways::{InMemorySourceGateway, InMemoryTargetStore};
//! use consolidation_migration::{Bounds, MigrationRunner};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! consolidation_migration::logging::init_structured_logging();
//!
//! let config = MigrationConfig::default();
//! let runner = MigrationRunner::builder()
//!     .source(Arc::new(InMemorySourceGateway::from_config(&config.source)))
//!     .config(config)
//!     .target(Arc::new(InMemoryTargetStore::new()))
//!     .build()
//!     .unwrap();
//!
//! let summary = runner.run(Bounds::new(["000", "111"], ["11", "15"])).await.unwrap();
//! println!("{}", summary.status);
//! # });
//! ```

use super::activities::{GetLeadRecordIdsActivity, GetPageCountActivity, MigrateRecordActivity};
use super::error_classifier::ErrorCategory;
use super::etl::EtlOrchestration;
use super::paging::PagingOrchestration;
use super::root::RootOrchestration;
use super::trigger::parse_trigger;
use crate::config::MigrationConfig;
use crate::constants::{activities, orchestrations};
use crate::error::{MigrationError, Result};
use crate::gateways::{ConsolidationOrderMapper, RecordMapper, SourceGateway, TargetGateway};
use crate::host::{HistoryStore, InMemoryHistoryStore, InstanceId, OrchestrationHost, Outcome};
use crate::models::{Bounds, RunSummary};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone, Debug)]
pub struct MigrationRunner {
    host: OrchestrationHost,
    config: MigrationConfig,
}

#[derive(Default)]
pub struct MigrationRunnerBuilder {
    config: Option<MigrationConfig>,
    source: Option<Arc<dyn SourceGateway>>,
    target: Option<Arc<dyn TargetGateway>>,
    mapper: Option<Arc<dyn RecordMapper>>,
    history_store: Option<Arc<dyn HistoryStore>>,
}

impl MigrationRunnerBuilder {
    pub fn config(mut self, config: MigrationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn source(mut self, source: Arc<dyn SourceGateway>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn target(mut self, target: Arc<dyn TargetGateway>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn mapper(mut self, mapper: Arc<dyn RecordMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Share a history store between runners to resume runs across restarts
    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history_store = Some(store);
        self
    }

    pub fn build(self) -> Result<MigrationRunner> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let source = self.source.ok_or_else(|| {
            MigrationError::ConfigurationError("a source gateway is required".to_string())
        })?;
        let target = self.target.ok_or_else(|| {
            MigrationError::ConfigurationError("a target gateway is required".to_string())
        })?;
        let mapper: Arc<dyn RecordMapper> = match self.mapper {
            Some(mapper) => mapper,
            None => Arc::new(ConsolidationOrderMapper),
        };
        let history_store: Arc<dyn HistoryStore> = match self.history_store {
            Some(store) => store,
            None => Arc::new(InMemoryHistoryStore::new()),
        };

        let host = OrchestrationHost::builder()
            .history_store(history_store)
            .register_orchestration(orchestrations::ROOT, Arc::new(RootOrchestration))
            .register_orchestration(orchestrations::PAGING, Arc::new(PagingOrchestration))
            .register_orchestration(orchestrations::ETL, Arc::new(EtlOrchestration))
            .register_activity(
                activities::GET_PAGE_COUNT,
                Arc::new(GetPageCountActivity::new(source.clone())),
            )
            .register_activity(
                activities::GET_LEAD_RECORD_IDS,
                Arc::new(GetLeadRecordIdsActivity::new(source.clone())),
            )
            .register_activity(
                activities::MIGRATE_RECORD,
                Arc::new(MigrateRecordActivity::new(source, target, mapper)),
            )
            .max_concurrent_activities(config.execution.max_concurrent_activities)
            .retry_policy(config.retry_policy())
            .cancellation_grace_period(config.execution.cancellation_grace_period())
            .build()?;

        Ok(MigrationRunner { host, config })
    }
}

impl MigrationRunner {
    pub fn builder() -> MigrationRunnerBuilder {
        MigrationRunnerBuilder::default()
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn host(&self) -> &OrchestrationHost {
        &self.host
    }

    /// Migrate everything within the bounds under a fresh run id
    pub async fn run(&self, bounds: Bounds) -> Result<RunSummary> {
        self.run_with_id(InstanceId::generate(), bounds).await
    }

    /// Start, resume or reattach to the run with this id.
    ///
    /// Invalid bounds produce an `Aborted` summary. A `ReplayInconsistency` is returned as
    /// an error: the run's history no longer matches the code and needs an operator.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run_with_id(&self, run_id: InstanceId, bounds: Bounds) -> Result<RunSummary> {
        let started_at = Utc::now();
        let input = serde_json::to_value(&bounds)?;
        let outcome = self
            .host
            .start_orchestration(orchestrations::ROOT, run_id.clone(), input)
            .await?;

        let mut summary = match outcome {
            Outcome::Completed(output) => serde_json::from_value::<RunSummary>(output)?,
            Outcome::Failed(failure) => match failure.category {
                ErrorCategory::InvalidInput => {
                    warn!(run_id = %run_id, reason = %failure.message, "Run aborted");
                    RunSummary::aborted(run_id.as_str(), failure.message)
                }
                ErrorCategory::Cancelled => RunSummary::cancelled(run_id.as_str()),
                ErrorCategory::StateInconsistency => {
                    return Err(MigrationError::replay_inconsistency(
                        run_id.as_str(),
                        failure.message,
                    ))
                }
                _ => return Err(MigrationError::OrchestrationError(failure.to_string())),
            },
        };
        summary.started_at = Some(started_at);
        summary.completed_at = Some(Utc::now());

        info!(
            run_id = %run_id,
            status = %summary.status,
            attempted = summary.tally.attempted,
            migrated = summary.tally.migrated,
            failed = summary.tally.failed,
            cancelled = summary.tally.cancelled,
            child_cases = summary.tally.child_cases_migrated,
            "Migration run finished"
        );
        Ok(summary)
    }

    /// Run from a JSON trigger payload. A payload that does not parse or validate yields an
    /// `Aborted` summary without starting any work.
    pub async fn run_trigger(&self, payload: &str) -> Result<RunSummary> {
        match parse_trigger(payload) {
            Ok(bounds) => self.run(bounds).await,
            Err(error) => {
                let run_id = InstanceId::generate();
                warn!(run_id = %run_id, error = %error, "Rejected trigger payload");
                let now = Utc::now();
                let mut summary = RunSummary::aborted(run_id.as_str(), error.to_string());
                summary.started_at = Some(now);
                summary.completed_at = Some(now);
                Ok(summary)
            }
        }
    }

    /// Cancel a run and its whole subtree
    pub fn cancel(&self, run_id: &InstanceId) -> bool {
        self.host.cancel(run_id)
    }
}
