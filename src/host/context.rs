//! # Orchestration Context
//!
//! The handle orchestrator code uses to schedule work. Every call gets a sequence
//! number in call order; recorded outcomes are replayed from history instead of being
//! executed again.

use super::history::{CallKind, Outcome, ReplayState, TaskFailure};
use super::instance_id::InstanceId;
use super::OrchestrationHost;
use crate::orchestration::error_classifier::ErrorCategory;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ContextInner {
    host: OrchestrationHost,
    instance_id: InstanceId,
    replay: ReplayState,
    next_seq: AtomicU64,
    nondeterminism: Mutex<Option<String>>,
    token: CancellationToken,
}

/// Scheduling handle passed to every orchestration body
#[derive(Clone)]
pub struct OrchestrationContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for OrchestrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationContext")
            .field("instance_id", &self.inner.instance_id)
            .field("next_seq", &self.inner.next_seq.load(Ordering::SeqCst))
            .finish()
    }
}

impl OrchestrationContext {
    pub(super) fn new(
        host: OrchestrationHost,
        instance_id: InstanceId,
        replay: ReplayState,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                host,
                instance_id,
                replay,
                next_seq: AtomicU64::new(0),
                nondeterminism: Mutex::new(None),
                token,
            }),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.inner.instance_id
    }

    /// Whether this instance (or an ancestor) has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Reason the body diverged from its history, if it has
    pub fn nondeterminism(&self) -> Option<String> {
        self.inner.nondeterminism.lock().clone()
    }

    /// Schedule an activity and get a future for its decoded output
    pub fn schedule_activity<I, O>(&self, name: &str, input: &I) -> BoxFuture<'static, Result<O, TaskFailure>>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned + Send + 'static,
    {
        let seq = self.next_seq();
        let input = match serde_json::to_value(input) {
            Ok(value) => value,
            Err(e) => return Self::ready(Err(Self::encode_failure(name, e))),
        };

        match self.resolve(seq, CallKind::Activity, name, None) {
            Resolution::Replayed(outcome) => Self::ready(Self::decode(name, outcome.into_result())),
            Resolution::Rejected(failure) => Self::ready(Err(failure)),
            Resolution::Dispatch { record_schedule } => {
                let host = self.inner.host.clone();
                let instance_id = self.inner.instance_id.clone();
                let token = self.inner.token.clone();
                let name = name.to_string();
                async move {
                    let result = host
                        .dispatch_activity(instance_id, seq, name.clone(), input, token, record_schedule)
                        .await;
                    Self::decode(&name, result)
                }
                .boxed()
            }
        }
    }

    /// Schedule a child orchestration under a deterministic child id
    pub fn schedule_sub_orchestration<I, O>(
        &self,
        name: &str,
        child_id: InstanceId,
        input: &I,
    ) -> BoxFuture<'static, Result<O, TaskFailure>>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned + Send + 'static,
    {
        let seq = self.next_seq();
        let input = match serde_json::to_value(input) {
            Ok(value) => value,
            Err(e) => return Self::ready(Err(Self::encode_failure(name, e))),
        };

        match self.resolve(seq, CallKind::SubOrchestration, name, Some(child_id.as_str())) {
            Resolution::Replayed(outcome) => Self::ready(Self::decode(name, outcome.into_result())),
            Resolution::Rejected(failure) => Self::ready(Err(failure)),
            Resolution::Dispatch { record_schedule } => {
                let host = self.inner.host.clone();
                let parent_id = self.inner.instance_id.clone();
                let token = self.inner.token.child_token();
                let name = name.to_string();
                async move {
                    let result = host
                        .dispatch_sub_orchestration(
                            parent_id,
                            seq,
                            name.clone(),
                            child_id,
                            input,
                            token,
                            record_schedule,
                        )
                        .await;
                    Self::decode(&name, result)
                }
                .boxed()
            }
        }
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Decide what to do with the call at `seq` given the history
    fn resolve(&self, seq: u64, kind: CallKind, name: &str, child_id: Option<&str>) -> Resolution {
        if let Some(reason) = self.nondeterminism() {
            return Resolution::Rejected(self.inconsistency_failure(reason));
        }

        match self.inner.replay.call(seq) {
            Some(recorded) => {
                if let Some(reason) = recorded.mismatch(kind, name, child_id) {
                    let reason = format!("seq {seq}: {reason}");
                    warn!(
                        instance_id = %self.inner.instance_id,
                        seq = seq,
                        reason = %reason,
                        "Replay diverged from recorded history"
                    );
                    *self.inner.nondeterminism.lock() = Some(reason.clone());
                    return Resolution::Rejected(self.inconsistency_failure(reason));
                }
                match &recorded.outcome {
                    Some(outcome) => {
                        self.inner.host.record_replayed(kind);
                        debug!(
                            instance_id = %self.inner.instance_id,
                            seq = seq,
                            call = %name,
                            "Replaying recorded outcome"
                        );
                        Resolution::Replayed(outcome.clone())
                    }
                    None if self.is_cancelled() => Resolution::Rejected(self.cancelled_failure(name)),
                    // Scheduled before a crash but never completed
                    None => Resolution::Dispatch {
                        record_schedule: false,
                    },
                }
            }
            None if self.is_cancelled() => Resolution::Rejected(self.cancelled_failure(name)),
            None => Resolution::Dispatch {
                record_schedule: true,
            },
        }
    }

    fn inconsistency_failure(&self, reason: String) -> TaskFailure {
        TaskFailure::new(ErrorCategory::StateInconsistency, "REPLAY_INCONSISTENCY", reason)
    }

    fn cancelled_failure(&self, name: &str) -> TaskFailure {
        TaskFailure::cancelled(format!(
            "{name} not dispatched: {} was cancelled",
            self.inner.instance_id
        ))
    }

    fn encode_failure(name: &str, error: serde_json::Error) -> TaskFailure {
        TaskFailure::new(
            ErrorCategory::InvalidInput,
            "INPUT_ENCODING_ERROR",
            format!("could not encode input for {name}: {error}"),
        )
    }

    fn decode<O: DeserializeOwned>(name: &str, result: Result<Value, TaskFailure>) -> Result<O, TaskFailure> {
        let value = result?;
        serde_json::from_value(value).map_err(|e| {
            TaskFailure::new(
                ErrorCategory::Internal,
                "OUTPUT_DECODING_ERROR",
                format!("could not decode output of {name}: {e}"),
            )
        })
    }

    fn ready<O: Send + 'static>(result: Result<O, TaskFailure>) -> BoxFuture<'static, Result<O, TaskFailure>> {
        future::ready(result).boxed()
    }
}

enum Resolution {
    Replayed(Outcome),
    Rejected(TaskFailure),
    Dispatch { record_schedule: bool },
}
