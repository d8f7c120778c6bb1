//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use consolidation_migration::config::MigrationConfig;
use consolidation_migration::gateways::{InMemorySourceGateway, InMemoryTargetStore};
use consolidation_migration::host::{HistoryEvent, InMemoryHistoryStore, InstanceId};
use consolidation_migration::models::SourceRecordId;
use consolidation_migration::orchestration::MigrationRunner;
use std::sync::Arc;
use std::time::Duration;

/// Configuration with millisecond backoff so retry paths stay fast
pub fn fast_config() -> MigrationConfig {
    let mut config = MigrationConfig::default();
    config.execution.max_concurrent_activities = 8;
    config.execution.activity_timeout_seconds = 5;
    config.execution.cancellation_grace_period_ms = 200;
    config.backoff.base_delay_ms = 1;
    config.backoff.max_backoff_seconds = 1;
    config.backoff.jitter_enabled = false;
    config
}

/// Everything a migration run touches, kept inspectable
pub struct MigrationFixture {
    pub source: Arc<InMemorySourceGateway>,
    pub target: Arc<InMemoryTargetStore>,
    pub history: Arc<InMemoryHistoryStore>,
    pub runner: MigrationRunner,
}

impl MigrationFixture {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: MigrationConfig) -> Self {
        consolidation_migration::logging::init_structured_logging();

        let source = Arc::new(InMemorySourceGateway::from_config(&config.source));
        let target = Arc::new(InMemoryTargetStore::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let runner = MigrationRunner::builder()
            .config(config)
            .source(source.clone())
            .target(target.clone())
            .history_store(history.clone())
            .build()
            .expect("runner should build");

        Self {
            source,
            target,
            history,
            runner,
        }
    }

    /// A second runner over the same gateways and history, as after a process restart
    pub fn restarted(&self) -> MigrationRunner {
        MigrationRunner::builder()
            .config(self.runner.config().clone())
            .source(self.source.clone())
            .target(self.target.clone())
            .history_store(self.history.clone())
            .build()
            .expect("runner should build")
    }

    /// Add `count` lead records (each with one child case) under a division and chapter.
    /// Returns the lead ids in the order the source pages them (highest first).
    pub fn seed_leads(&self, division_code: &str, chapter: &str, count: usize) -> Vec<SourceRecordId> {
        let mut ids = Vec::with_capacity(count);
        for n in 1..=count {
            let lead = format!("{division_code}23{n:05}");
            let child = format!("{division_code}23{:05}", 50_000 + n);
            self.source
                .add_consolidation(division_code, chapter, &lead, &[(child.as_str(), "S", "20230315")]);
            ids.push(SourceRecordId::new(lead));
        }
        ids.reverse();
        ids
    }

    /// Child instance ids an instance has scheduled, in sequence order
    pub fn scheduled_children(&self, instance_id: &InstanceId) -> Vec<String> {
        self.history
            .snapshot(instance_id)
            .into_iter()
            .filter_map(|event| match event {
                HistoryEvent::SubOrchestrationScheduled { instance_id, .. } => Some(instance_id),
                _ => None,
            })
            .collect()
    }
}

impl Default for MigrationFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll until the condition holds or the deadline passes
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}
