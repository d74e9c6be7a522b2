use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    CHAT_COLLECTION, RemoteEvent, RemoteService, Subscription, chat_channel,
    error::{RemoteError, RemoteResult},
    record_id,
};

/// In-process stand-in for the remote service.
///
/// Used by tests and by daemons configured without a remote endpoint. It can
/// be switched to unreachable to exercise the local fallbacks.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<MemoryRemoteInner>,
}

#[derive(Default)]
struct MemoryRemoteInner {
    reachable: AtomicBool,
    collections: DashMap<String, Vec<Value>>,
    histories: DashMap<String, Vec<Value>>,
    subscribers: DashMap<String, Vec<(u64, mpsc::UnboundedSender<RemoteEvent>)>>,
    next_subscriber: AtomicU64,
}

impl MemoryRemote {
    /// A reachable service with no data.
    pub fn new() -> Self {
        let remote = Self::default();
        remote.set_reachable(true);
        remote
    }

    /// A service that refuses every call.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Make every later call succeed or fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Replace the server-side content of a collection.
    pub fn seed(&self, collection: &str, records: Vec<Value>) {
        self.inner.collections.insert(collection.to_string(), records);
    }

    /// Current server-side content of a collection.
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.inner
            .collections
            .get(collection)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Append to a channel's history and push to its live subscribers.
    pub fn publish(&self, channel: &str, payload: Value) {
        self.inner
            .histories
            .entry(channel.to_string())
            .or_default()
            .push(payload.clone());
        self.inner.push(channel, payload);
    }

    /// Push to live subscribers only, without touching the history.
    pub fn push(&self, channel: &str, payload: Value) {
        self.inner.push(channel, payload);
    }

    /// Number of live subscriptions on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .subscribers
            .get(channel)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    fn ensure_reachable(&self) -> RemoteResult<()> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable)
        }
    }
}

impl MemoryRemoteInner {
    fn push(&self, channel: &str, payload: Value) {
        if let Some(mut subscribers) = self.subscribers.get_mut(channel) {
            subscribers.retain(|(_, tx)| {
                tx.send(RemoteEvent {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
            });
        }
    }

    fn upsert(&self, collection: &str, record: Value) -> RemoteResult<Value> {
        let id = record_id(&record).ok_or_else(|| RemoteError::MissingId {
            collection: collection.to_string(),
        })?;
        let mut records = self.collections.entry(collection.to_string()).or_default();
        match records
            .iter()
            .position(|existing| record_id(existing).as_deref() == Some(id.as_str()))
        {
            Some(index) => records[index] = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }
}

impl RemoteService for MemoryRemote {
    fn fetch(&self, collection: &str) -> BoxFuture<'static, RemoteResult<Vec<Value>>> {
        let remote = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            remote.ensure_reachable()?;
            Ok(remote.records(&collection))
        })
    }

    fn create(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>> {
        let remote = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            remote.ensure_reachable()?;
            let created = remote.inner.upsert(&collection, record)?;
            if collection == CHAT_COLLECTION {
                if let Some(community) = created.get("communityId").and_then(Value::as_str) {
                    remote.publish(&chat_channel(community), created.clone());
                }
            }
            Ok(created)
        })
    }

    fn update(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>> {
        let remote = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            remote.ensure_reachable()?;
            remote.inner.upsert(&collection, record)
        })
    }

    fn delete(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>> {
        let remote = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            remote.ensure_reachable()?;
            let id = record_id(&record).ok_or_else(|| RemoteError::MissingId {
                collection: collection.clone(),
            })?;
            if let Some(mut records) = remote.inner.collections.get_mut(&collection) {
                records.retain(|existing| record_id(existing).as_deref() != Some(id.as_str()));
            }
            Ok(record)
        })
    }

    fn subscribe(&self, channel: &str) -> BoxFuture<'static, RemoteResult<Subscription>> {
        let remote = self.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            remote.ensure_reachable()?;
            let (tx, rx) = mpsc::unbounded_channel();
            let subscriber = remote.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
            remote
                .inner
                .subscribers
                .entry(channel.clone())
                .or_default()
                .push((subscriber, tx));

            let weak = Arc::downgrade(&remote.inner);
            Ok(Subscription::new(rx, move || {
                if let Some(inner) = weak.upgrade() {
                    if let Some(mut subscribers) = inner.subscribers.get_mut(&channel) {
                        subscribers.retain(|(id, _)| *id != subscriber);
                    }
                }
            }))
        })
    }

    fn fetch_history(&self, channel: &str) -> BoxFuture<'static, RemoteResult<Vec<Value>>> {
        let remote = self.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            remote.ensure_reachable()?;
            Ok(remote
                .inner
                .histories
                .get(&channel)
                .map(|entry| entry.value().clone())
                .unwrap_or_default())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>> {
        let remote = self.clone();
        Box::pin(async move { remote.ensure_reachable() })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn unreachable_remote_fails_every_call() {
        let remote = MemoryRemote::unreachable();
        assert!(matches!(
            remote.fetch("players").await,
            Err(RemoteError::Unreachable)
        ));
        assert!(remote.subscribe("community:1").await.is_err());
        assert!(remote.health_check().await.is_err());
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let remote = MemoryRemote::new();
        let mut subscription = remote.subscribe("community:1").await.unwrap();
        assert_eq!(remote.subscriber_count("community:1"), 1);

        remote.push("community:1", json!({ "id": "m1" }));
        let event = subscription.next().await.unwrap();
        assert_eq!(event.payload, json!({ "id": "m1" }));

        drop(subscription);
        assert_eq!(remote.subscriber_count("community:1"), 0);
    }

    #[tokio::test]
    async fn update_replaces_record_with_same_id() {
        let remote = MemoryRemote::new();
        remote.seed("teams", vec![json!({ "id": 1, "name": "Falcons" })]);

        remote
            .update("teams", json!({ "id": 1, "name": "Hawks" }))
            .await
            .unwrap();
        assert_eq!(remote.records("teams"), vec![json!({ "id": 1, "name": "Hawks" })]);

        remote.delete("teams", json!({ "id": 1 })).await.unwrap();
        assert!(remote.records("teams").is_empty());
    }
}
