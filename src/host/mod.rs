//! # Orchestration Host
//!
//! In-process durable execution for the orchestration tree.
//!
//! ## Key Features
//!
//! - **Step log**: every instance owns an append-only history in a [`HistoryStore`]
//! - **Replay**: a restarted instance folds its history and replays recorded outcomes
//!   instead of executing them again; calls scheduled but never completed are dispatched
//!   again (at-least-once)
//! - **Reattach**: starting an instance that already finished returns its recorded result
//! - **Worker pool**: activity attempts are bounded by a semaphore
//! - **Retries**: per-attempt timeout with exponential backoff, driven by the error classifier
//! - **Cancellation**: one token per instance, child tokens per sub-orchestration, with a
//!   grace period for in-flight activities
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consolidation_migration::host::{InMemoryHistoryStore, InstanceId, OrchestrationHost};
//! use std::sync::Arc;
//!
//! # async fn example() -> consolidation_migration::error::Result<()> {
//! let host = OrchestrationHost::builder()
//!     .history_store(Arc::new(InMemoryHistoryStore::new()))
//!     .max_concurrent_activities(8)
//!     .build()?;
//! let outcome = host
//!     .start_orchestration("my_orchestration", InstanceId::generate(), serde_json::json!({}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod history;
pub mod instance_id;
pub mod retry;
pub mod store;

pub use context::OrchestrationContext;
pub use history::{CallKind, HistoryEvent, Outcome, ReplayState, TaskFailure};
pub use instance_id::InstanceId;
pub use retry::RetryPolicy;
pub use store::{HistoryStore, InMemoryHistoryStore};

use crate::constants::events;
use crate::error::{MigrationError, Result};
use crate::logging::log_activity_operation;
use crate::orchestration::error_classifier::{
    ErrorClassifier, ErrorContext, StandardErrorClassifier,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A unit of side-effecting work. Runs at least once; must be idempotent.
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Deterministic orchestrator body. Must reach every effect through the context.
#[async_trait]
pub trait Orchestration: Send + Sync + 'static {
    async fn run(&self, ctx: OrchestrationContext, input: Value) -> Result<Value>;
}

/// Counters describing host activity since construction
#[derive(Debug, Default)]
struct HostMetrics {
    orchestrations_started: AtomicU64,
    orchestrations_reattached: AtomicU64,
    activity_attempts: AtomicU64,
    activity_retries: AtomicU64,
    activities_abandoned: AtomicU64,
    calls_replayed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Point-in-time copy of the host counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostMetricsSnapshot {
    pub orchestrations_started: u64,
    pub orchestrations_reattached: u64,
    pub activity_attempts: u64,
    pub activity_retries: u64,
    pub activities_abandoned: u64,
    pub calls_replayed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

/// Decrements the in-flight gauge when an attempt ends, however it ends
struct InFlightGuard(Arc<HostInner>);

impl InFlightGuard {
    fn enter(inner: Arc<HostInner>) -> Self {
        let now = inner.metrics.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.metrics.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.metrics.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct HostInner {
    store: Arc<dyn HistoryStore>,
    activities: HashMap<String, Arc<dyn Activity>>,
    orchestrations: HashMap<String, Arc<dyn Orchestration>>,
    classifier: Arc<dyn ErrorClassifier>,
    workers: Arc<Semaphore>,
    max_concurrent_activities: usize,
    retry_policy: RetryPolicy,
    cancellation_grace_period: Duration,
    live: DashMap<InstanceId, CancellationToken>,
    metrics: HostMetrics,
}

/// Durable, replay-safe executor for registered orchestrations and activities
#[derive(Clone)]
pub struct OrchestrationHost {
    inner: Arc<HostInner>,
}

impl std::fmt::Debug for OrchestrationHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationHost")
            .field("activities", &self.inner.activities.keys().collect::<Vec<_>>())
            .field(
                "orchestrations",
                &self.inner.orchestrations.keys().collect::<Vec<_>>(),
            )
            .field("max_concurrent_activities", &self.inner.max_concurrent_activities)
            .field("live_instances", &self.inner.live.len())
            .finish()
    }
}

/// Builder for [`OrchestrationHost`]
pub struct OrchestrationHostBuilder {
    store: Option<Arc<dyn HistoryStore>>,
    activities: HashMap<String, Arc<dyn Activity>>,
    orchestrations: HashMap<String, Arc<dyn Orchestration>>,
    classifier: Arc<dyn ErrorClassifier>,
    max_concurrent_activities: usize,
    retry_policy: RetryPolicy,
    cancellation_grace_period: Duration,
}

impl Default for OrchestrationHostBuilder {
    fn default() -> Self {
        Self {
            store: None,
            activities: HashMap::new(),
            orchestrations: HashMap::new(),
            classifier: Arc::new(StandardErrorClassifier::new()),
            max_concurrent_activities: 16,
            retry_policy: RetryPolicy::default(),
            cancellation_grace_period: Duration::from_secs(5),
        }
    }
}

impl OrchestrationHostBuilder {
    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn register_activity(mut self, name: &str, activity: Arc<dyn Activity>) -> Self {
        self.activities.insert(name.to_string(), activity);
        self
    }

    pub fn register_orchestration(mut self, name: &str, orchestration: Arc<dyn Orchestration>) -> Self {
        self.orchestrations.insert(name.to_string(), orchestration);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn max_concurrent_activities(mut self, workers: usize) -> Self {
        self.max_concurrent_activities = workers;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn cancellation_grace_period(mut self, grace: Duration) -> Self {
        self.cancellation_grace_period = grace;
        self
    }

    pub fn build(self) -> Result<OrchestrationHost> {
        if self.max_concurrent_activities == 0 {
            return Err(MigrationError::ConfigurationError(
                "orchestration host needs at least one worker".to_string(),
            ));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(MigrationError::ConfigurationError(
                "retry policy must allow at least one attempt".to_string(),
            ));
        }

        let store: Arc<dyn HistoryStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryHistoryStore::new()),
        };

        Ok(OrchestrationHost {
            inner: Arc::new(HostInner {
                store,
                activities: self.activities,
                orchestrations: self.orchestrations,
                classifier: self.classifier,
                workers: Arc::new(Semaphore::new(self.max_concurrent_activities)),
                max_concurrent_activities: self.max_concurrent_activities,
                retry_policy: self.retry_policy,
                cancellation_grace_period: self.cancellation_grace_period,
                live: DashMap::new(),
                metrics: HostMetrics::default(),
            }),
        })
    }
}

impl OrchestrationHost {
    pub fn builder() -> OrchestrationHostBuilder {
        OrchestrationHostBuilder::default()
    }

    /// Start (or resume, or reattach to) a top-level instance and wait for its outcome.
    ///
    /// `Ok(Outcome::Failed)` is a failure the orchestration itself reported.
    /// `Err` is reserved for host-level faults, notably `ReplayInconsistency`.
    #[instrument(skip_all, fields(instance_id = %instance_id, orchestration = %name))]
    pub async fn start_orchestration(
        &self,
        name: &str,
        instance_id: InstanceId,
        input: Value,
    ) -> Result<Outcome> {
        self.run_instance(name.to_string(), instance_id, input, CancellationToken::new())
            .await
    }

    /// Cancel a running instance and its whole subtree
    pub fn cancel(&self, instance_id: &InstanceId) -> bool {
        match self.inner.live.get(instance_id) {
            Some(token) => {
                info!(instance_id = %instance_id, "🛑 Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, instance_id: &InstanceId) -> bool {
        self.inner.live.contains_key(instance_id)
    }

    pub async fn history(&self, instance_id: &InstanceId) -> Result<Vec<HistoryEvent>> {
        self.inner.store.read(instance_id).await
    }

    pub fn history_store(&self) -> Arc<dyn HistoryStore> {
        self.inner.store.clone()
    }

    pub fn max_concurrent_activities(&self) -> usize {
        self.inner.max_concurrent_activities
    }

    pub fn metrics(&self) -> HostMetricsSnapshot {
        let m = &self.inner.metrics;
        HostMetricsSnapshot {
            orchestrations_started: m.orchestrations_started.load(Ordering::SeqCst),
            orchestrations_reattached: m.orchestrations_reattached.load(Ordering::SeqCst),
            activity_attempts: m.activity_attempts.load(Ordering::SeqCst),
            activity_retries: m.activity_retries.load(Ordering::SeqCst),
            activities_abandoned: m.activities_abandoned.load(Ordering::SeqCst),
            calls_replayed: m.calls_replayed.load(Ordering::SeqCst),
            in_flight: m.in_flight.load(Ordering::SeqCst),
            peak_in_flight: m.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn record_replayed(&self, _kind: CallKind) {
        self.inner.metrics.calls_replayed.fetch_add(1, Ordering::SeqCst);
    }

    /// Boxed so child instances can recurse through `dispatch_sub_orchestration`
    fn run_instance(
        &self,
        name: String,
        instance_id: InstanceId,
        input: Value,
        token: CancellationToken,
    ) -> BoxFuture<'static, Result<Outcome>> {
        let host = self.clone();
        async move {
            let orchestration = host
                .inner
                .orchestrations
                .get(&name)
                .cloned()
                .ok_or_else(|| {
                    MigrationError::OrchestrationError(format!("orchestration '{name}' is not registered"))
                })?;

            let history = host.inner.store.read(&instance_id).await?;
            let replay = ReplayState::fold(&history)?;

            if let Some(outcome) = replay.terminal() {
                host.inner
                    .metrics
                    .orchestrations_reattached
                    .fetch_add(1, Ordering::SeqCst);
                info!(
                    event = events::WORKFLOW_REATTACHED,
                    instance_id = %instance_id,
                    orchestration = %name,
                    "Instance already finished, returning recorded outcome"
                );
                return Ok(outcome.clone());
            }

            let input = match replay.started() {
                Some((recorded_name, _)) if recorded_name != &name => {
                    return Err(MigrationError::replay_inconsistency(
                        instance_id.as_str(),
                        format!("instance was started as '{recorded_name}', not '{name}'"),
                    ));
                }
                // The recorded input wins over whatever the caller passed this time
                Some((_, recorded_input)) => recorded_input.clone(),
                None => {
                    host.inner
                        .store
                        .append(
                            &instance_id,
                            vec![HistoryEvent::ExecutionStarted {
                                name: name.clone(),
                                input: input.clone(),
                            }],
                        )
                        .await?;
                    input
                }
            };

            host.inner
                .metrics
                .orchestrations_started
                .fetch_add(1, Ordering::SeqCst);
            debug!(
                instance_id = %instance_id,
                orchestration = %name,
                recorded_calls = replay.scheduled_calls(),
                pending_calls = replay.pending_calls(),
                "Running orchestration"
            );

            host.inner.live.insert(instance_id.clone(), token.clone());
            let ctx = OrchestrationContext::new(host.clone(), instance_id.clone(), replay, token);
            let result = orchestration.run(ctx.clone(), input).await;
            host.inner.live.remove(&instance_id);

            if let Some(reason) = ctx.nondeterminism() {
                let error = MigrationError::replay_inconsistency(instance_id.as_str(), reason);
                let failure = host.classify_final(&instance_id, &name, &error);
                host.inner
                    .store
                    .append(&instance_id, vec![HistoryEvent::ExecutionFailed { failure }])
                    .await?;
                return Err(error);
            }

            match result {
                Ok(output) => {
                    host.inner
                        .store
                        .append(
                            &instance_id,
                            vec![HistoryEvent::ExecutionCompleted {
                                output: output.clone(),
                            }],
                        )
                        .await?;
                    Ok(Outcome::Completed(output))
                }
                Err(error) => {
                    let failure = host.classify_final(&instance_id, &name, &error);
                    warn!(
                        instance_id = %instance_id,
                        orchestration = %name,
                        error = %error,
                        "Orchestration failed"
                    );
                    host.inner
                        .store
                        .append(
                            &instance_id,
                            vec![HistoryEvent::ExecutionFailed {
                                failure: failure.clone(),
                            }],
                        )
                        .await?;
                    Ok(Outcome::Failed(failure))
                }
            }
        }
        .boxed()
    }

    fn classify_final(&self, instance_id: &InstanceId, operation: &str, error: &MigrationError) -> TaskFailure {
        let context = ErrorContext::final_attempt(instance_id.as_str(), operation);
        TaskFailure::from(&self.inner.classifier.classify_error(error, &context))
    }

    /// Run an activity to a recorded outcome. Called by the context.
    pub(crate) async fn dispatch_activity(
        &self,
        instance_id: InstanceId,
        seq: u64,
        name: String,
        input: Value,
        token: CancellationToken,
        record_schedule: bool,
    ) -> std::result::Result<Value, TaskFailure> {
        let store = &self.inner.store;
        if record_schedule {
            store
                .append(
                    &instance_id,
                    vec![HistoryEvent::ActivityScheduled {
                        seq,
                        name: name.clone(),
                        input: input.clone(),
                    }],
                )
                .await
                .map_err(|e| TaskFailure::internal(e.to_string()))?;
        }

        let result = self
            .execute_activity(&instance_id, seq, &name, input, &token)
            .await;

        let event = match &result {
            Ok(output) => HistoryEvent::ActivityCompleted {
                seq,
                output: output.clone(),
            },
            // Abandoned work stays unrecorded so a later replay dispatches it again
            Err(failure) if failure.is_cancelled() => return result,
            Err(failure) => HistoryEvent::ActivityFailed {
                seq,
                failure: failure.clone(),
            },
        };
        store
            .append(&instance_id, vec![event])
            .await
            .map_err(|e| TaskFailure::internal(e.to_string()))?;
        result
    }

    /// Run a child instance to a recorded outcome. Called by the context.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn dispatch_sub_orchestration(
        &self,
        parent_id: InstanceId,
        seq: u64,
        name: String,
        child_id: InstanceId,
        input: Value,
        token: CancellationToken,
        record_schedule: bool,
    ) -> std::result::Result<Value, TaskFailure> {
        let store = &self.inner.store;
        if record_schedule {
            store
                .append(
                    &parent_id,
                    vec![HistoryEvent::SubOrchestrationScheduled {
                        seq,
                        name: name.clone(),
                        instance_id: child_id.to_string(),
                        input: input.clone(),
                    }],
                )
                .await
                .map_err(|e| TaskFailure::internal(e.to_string()))?;
        }

        let child = tokio::spawn(self.run_instance(name.clone(), child_id.clone(), input, token));
        let result = match child.await {
            Ok(Ok(outcome)) => outcome.into_result(),
            Ok(Err(error)) => Err(self.classify_final(&child_id, &name, &error)),
            Err(join_error) => Err(TaskFailure::internal(format!(
                "child {child_id} panicked: {join_error}"
            ))),
        };

        let event = match &result {
            Ok(output) => HistoryEvent::SubOrchestrationCompleted {
                seq,
                output: output.clone(),
            },
            Err(failure) => HistoryEvent::SubOrchestrationFailed {
                seq,
                failure: failure.clone(),
            },
        };
        store
            .append(&parent_id, vec![event])
            .await
            .map_err(|e| TaskFailure::internal(e.to_string()))?;
        result
    }

    /// Attempt loop: worker slot, timeout, classification, backoff
    async fn execute_activity(
        &self,
        instance_id: &InstanceId,
        seq: u64,
        name: &str,
        input: Value,
        token: &CancellationToken,
    ) -> std::result::Result<Value, TaskFailure> {
        let activity = self
            .inner
            .activities
            .get(name)
            .cloned()
            .ok_or_else(|| TaskFailure::internal(format!("activity '{name}' is not registered")))?;
        let policy = &self.inner.retry_policy;
        let abandoned = || {
            TaskFailure::cancelled(format!(
                "{name} (seq {seq}) in {instance_id} abandoned after cancellation"
            ))
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(abandoned()),
                permit = self.inner.workers.clone().acquire_owned() => {
                    permit.map_err(|_| TaskFailure::internal("worker pool closed"))?
                }
            };
            if token.is_cancelled() {
                return Err(abandoned());
            }

            self.inner
                .metrics
                .activity_attempts
                .fetch_add(1, Ordering::SeqCst);
            log_activity_operation(events::ACTIVITY_STARTED, instance_id.as_str(), name, seq, attempt, None);

            let guard = InFlightGuard::enter(self.inner.clone());
            let attempt_activity = activity.clone();
            let attempt_input = input.clone();
            let timeout = policy.timeout;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                tokio::time::timeout(timeout, attempt_activity.execute(attempt_input)).await
            });
            let abort = handle.abort_handle();
            let grace = self.inner.cancellation_grace_period;

            let joined = tokio::select! {
                joined = handle => Some(joined),
                _ = async {
                    token.cancelled().await;
                    tokio::time::sleep(grace).await;
                } => None,
            };

            let result = match joined {
                None => {
                    abort.abort();
                    self.inner
                        .metrics
                        .activities_abandoned
                        .fetch_add(1, Ordering::SeqCst);
                    log_activity_operation(
                        events::ACTIVITY_ABANDONED,
                        instance_id.as_str(),
                        name,
                        seq,
                        attempt,
                        Some("grace period elapsed"),
                    );
                    return Err(abandoned());
                }
                Some(Err(join_error)) => Err(MigrationError::OrchestrationError(format!(
                    "activity task failed: {join_error}"
                ))),
                Some(Ok(Err(_elapsed))) => Err(MigrationError::Timeout {
                    operation: name.to_string(),
                    timeout,
                }),
                Some(Ok(Ok(result))) => result,
            };

            let error = match result {
                Ok(output) => {
                    log_activity_operation(events::ACTIVITY_COMPLETED, instance_id.as_str(), name, seq, attempt, None);
                    return Ok(output);
                }
                Err(error) => error,
            };

            let context = ErrorContext::new(instance_id.as_str(), name, attempt, policy.max_attempts);
            let classification = self.inner.classifier.classify_error(&error, &context);
            if !classification.is_retryable {
                log_activity_operation(
                    events::ACTIVITY_FAILED,
                    instance_id.as_str(),
                    name,
                    seq,
                    attempt,
                    Some(classification.error_message.as_str()),
                );
                return Err(TaskFailure::from(&classification));
            }

            let delay = policy.delay_for_attempt(attempt);
            self.inner
                .metrics
                .activity_retries
                .fetch_add(1, Ordering::SeqCst);
            debug!(
                event = events::ACTIVITY_RETRY_SCHEDULED,
                instance_id = %instance_id,
                activity = %name,
                seq = seq,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying activity after backoff"
            );

            tokio::select! {
                _ = token.cancelled() => return Err(abandoned()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Activity for Echo {
        async fn execute(&self, input: Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    /// Fails transiently until the given number of calls have been made
    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl Activity for Flaky {
        async fn execute(&self, _input: Value) -> Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(MigrationError::transient("flaky", "try again"))
            } else {
                Ok(json!("ok"))
            }
        }
    }

    struct Twice;

    #[async_trait]
    impl Orchestration for Twice {
        async fn run(&self, ctx: OrchestrationContext, input: Value) -> Result<Value> {
            let first: Value = ctx
                .schedule_activity("echo", &input)
                .await
                .map_err(|f| f.into_error("echo"))?;
            let second: Value = ctx
                .schedule_activity("echo", &json!("again"))
                .await
                .map_err(|f| f.into_error("echo"))?;
            Ok(json!([first, second]))
        }
    }

    struct CallsFlaky;

    #[async_trait]
    impl Orchestration for CallsFlaky {
        async fn run(&self, ctx: OrchestrationContext, _input: Value) -> Result<Value> {
            let result: std::result::Result<Value, TaskFailure> =
                ctx.schedule_activity("flaky", &json!(null)).await;
            Ok(json!(result.is_ok()))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn test_completed_instance_reattaches_without_rerunning() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let host = OrchestrationHost::builder()
            .register_activity("echo", echo.clone())
            .register_orchestration("twice", Arc::new(Twice))
            .build()
            .unwrap();
        let id = InstanceId::new("twice-1");

        let first = host
            .start_orchestration("twice", id.clone(), json!("hello"))
            .await
            .unwrap();
        assert_eq!(first, Outcome::Completed(json!(["hello", "again"])));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);

        let second = host
            .start_orchestration("twice", id.clone(), json!("ignored"))
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
        assert_eq!(host.metrics().orchestrations_reattached, 1);
    }

    #[tokio::test]
    async fn test_lost_completion_is_dispatched_again() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryHistoryStore::new());
        let host = OrchestrationHost::builder()
            .history_store(store.clone())
            .register_activity("echo", echo.clone())
            .register_orchestration("twice", Arc::new(Twice))
            .build()
            .unwrap();
        let id = InstanceId::new("twice-2");
        host.start_orchestration("twice", id.clone(), json!("hello"))
            .await
            .unwrap();

        // Crash after the second activity was scheduled but before it completed
        store.retain(&id, |event| {
            !event.is_terminal()
                && !matches!(event, HistoryEvent::ActivityCompleted { seq: 1, .. })
        });

        let outcome = host
            .start_orchestration("twice", id.clone(), json!("hello"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed(json!(["hello", "again"])));
        // seq 0 replayed, seq 1 executed once more
        assert_eq!(echo.calls.load(Ordering::SeqCst), 3);
        assert_eq!(host.metrics().calls_replayed, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 2,
        });
        let host = OrchestrationHost::builder()
            .register_activity("flaky", flaky.clone())
            .register_orchestration("calls_flaky", Arc::new(CallsFlaky))
            .retry_policy(fast_policy(3))
            .build()
            .unwrap();

        let outcome = host
            .start_orchestration("calls_flaky", InstanceId::new("flaky-1"), json!(null))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed(json!(true)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(host.metrics().activity_retries, 2);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
        });
        let host = OrchestrationHost::builder()
            .register_activity("flaky", flaky.clone())
            .register_orchestration("calls_flaky", Arc::new(CallsFlaky))
            .retry_policy(fast_policy(2))
            .build()
            .unwrap();

        let outcome = host
            .start_orchestration("calls_flaky", InstanceId::new("flaky-2"), json!(null))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed(json!(false)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_orchestration_is_an_error() {
        let host = OrchestrationHost::builder().build().unwrap();
        let result = host
            .start_orchestration("missing", InstanceId::new("x"), json!(null))
            .await;
        assert!(matches!(result, Err(MigrationError::OrchestrationError(_))));
    }

    #[test]
    fn test_builder_rejects_zero_workers() {
        assert!(OrchestrationHost::builder()
            .max_concurrent_activities(0)
            .build()
            .is_err());
    }
}
