#[cfg(feature = "http-remote")]
mod http;
mod memory;

/// Errors of remote calls.
pub mod error;

#[cfg(feature = "http-remote")]
pub use http::HttpRemote;
pub use memory::MemoryRemote;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use self::error::RemoteResult;

/// Remote collection holding chat messages.
pub const CHAT_COLLECTION: &str = "chatMessages";

/// Realtime channel name of a community chat.
pub fn chat_channel(community_id: &str) -> String {
    format!("community:{community_id}")
}

/// Payload pushed by the service on a subscribed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    /// Channel the event was published on.
    pub channel: String,
    /// Event body as sent by the service.
    pub payload: Value,
}

/// Live subscription to a realtime channel; dropping it unsubscribes.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<RemoteEvent>,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap `receiver`; `on_drop` runs once when the subscription is dropped.
    pub fn new(
        events: mpsc::UnboundedReceiver<RemoteEvent>,
        unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            events,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Next pushed event, or `None` once the channel is closed.
    pub async fn next(&mut self) -> Option<RemoteEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// Abstraction over the remote authoritative service.
///
/// Callers must treat every failure as recoverable: the engine falls back to
/// cached local state instead of propagating remote errors.
pub trait RemoteService: Send + Sync {
    /// Every record of `collection`.
    fn fetch(&self, collection: &str) -> BoxFuture<'static, RemoteResult<Vec<Value>>>;
    /// Insert `record` and return it as stored.
    fn create(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>>;
    /// Replace the record with the same id.
    fn update(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>>;
    /// Remove the record with the same id.
    fn delete(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>>;
    /// Live events of `channel` from now on.
    fn subscribe(&self, channel: &str) -> BoxFuture<'static, RemoteResult<Subscription>>;
    /// Events already published on `channel`.
    fn fetch_history(&self, channel: &str) -> BoxFuture<'static, RemoteResult<Vec<Value>>>;
    /// Succeeds when the service answers.
    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>>;
}

/// Extract the `id` of a record as a path segment.
fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
