use super::history::HistoryEvent;
use super::instance_id::InstanceId;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Durable home of instance histories, keyed by instance id
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Full history of an instance; empty if it has never run
    async fn read(&self, instance_id: &InstanceId) -> Result<Vec<HistoryEvent>>;

    /// Append events in order
    async fn append(&self, instance_id: &InstanceId, events: Vec<HistoryEvent>) -> Result<()>;

    /// Every instance with a history
    async fn instances(&self) -> Result<Vec<InstanceId>>;
}

/// History store that lives as long as the process
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    histories: DashMap<InstanceId, Vec<HistoryEvent>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous snapshot of one history
    pub fn snapshot(&self, instance_id: &InstanceId) -> Vec<HistoryEvent> {
        self.histories
            .get(instance_id)
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    /// Replace a history wholesale
    pub fn seed(&self, instance_id: InstanceId, events: Vec<HistoryEvent>) {
        self.histories.insert(instance_id, events);
    }

    /// Keep only the events matching the predicate. Simulates a crash that lost part of
    /// an instance's log.
    pub fn retain<F>(&self, instance_id: &InstanceId, mut keep: F)
    where
        F: FnMut(&HistoryEvent) -> bool,
    {
        if let Some(mut history) = self.histories.get_mut(instance_id) {
            history.retain(|event| keep(event));
        }
    }

    /// Drop everything after the first `len` events
    pub fn truncate(&self, instance_id: &InstanceId, len: usize) {
        if let Some(mut history) = self.histories.get_mut(instance_id) {
            history.truncate(len);
        }
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn read(&self, instance_id: &InstanceId) -> Result<Vec<HistoryEvent>> {
        Ok(self.snapshot(instance_id))
    }

    async fn append(&self, instance_id: &InstanceId, events: Vec<HistoryEvent>) -> Result<()> {
        self.histories
            .entry(instance_id.clone())
            .or_default()
            .extend(events);
        Ok(())
    }

    async fn instances(&self) -> Result<Vec<InstanceId>> {
        let mut ids: Vec<InstanceId> = self.histories.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_read() {
        let store = InMemoryHistoryStore::new();
        let id = InstanceId::new("run-1");

        store
            .append(
                &id,
                vec![HistoryEvent::ExecutionStarted {
                    name: "root".into(),
                    input: json!({}),
                }],
            )
            .await
            .unwrap();
        store
            .append(
                &id,
                vec![HistoryEvent::ExecutionCompleted { output: json!(1) }],
            )
            .await
            .unwrap();

        let history = store.read(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].is_terminal());
        assert!(store.read(&InstanceId::new("nope")).await.unwrap().is_empty());
        assert_eq!(store.instances().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_retain_drops_events() {
        let store = InMemoryHistoryStore::new();
        let id = InstanceId::new("run-1");
        store.seed(
            id.clone(),
            vec![
                HistoryEvent::ExecutionStarted {
                    name: "root".into(),
                    input: json!({}),
                },
                HistoryEvent::ExecutionCompleted { output: json!(1) },
            ],
        );

        store.retain(&id, |event| !event.is_terminal());
        assert_eq!(store.snapshot(&id).len(), 1);
        store.truncate(&id, 0);
        assert!(store.snapshot(&id).is_empty());
    }
}
