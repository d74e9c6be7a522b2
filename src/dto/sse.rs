use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    dao::{
        collections::collection_len,
        models::{CollectionKey, Document},
    },
    state::bus::ContextId,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Context the stream reports on.
    pub context: ContextId,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize)]
/// Broadcast whenever the in-memory view of the document changes.
pub struct DocumentChangedEvent {
    /// Number of records per collection after the change.
    pub counts: BTreeMap<CollectionKey, usize>,
}

impl From<&Document> for DocumentChangedEvent {
    fn from(document: &Document) -> Self {
        let counts = CollectionKey::ALL
            .iter()
            .map(|key| (*key, collection_len(document, *key)))
            .collect();
        Self { counts }
    }
}
