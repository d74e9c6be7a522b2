use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::dao::models::Document;

/// Identifier of one execution context (one open client of the profile).
pub type ContextId = Uuid;

const DEFAULT_CAPACITY: usize = 64;

/// Notification that a key of the shared medium changed.
#[derive(Debug, Clone)]
pub struct StorageChange {
    /// Context that performed the write.
    pub origin: ContextId,
    /// Medium key that was written.
    pub key: String,
    /// New document, when the change concerns the document key.
    pub document: Option<Arc<Document>>,
}

/// Transport delivering changes to the other contexts of the same profile.
pub trait InterContextChannel: Send + Sync {
    /// Deliver `change` to the other contexts.
    fn publish(&self, change: StorageChange);
    /// Changes published by any context from now on.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// In-process relay shared by every context attached to the same medium.
pub struct RelayChannel {
    sender: broadcast::Sender<StorageChange>,
}

impl RelayChannel {
    /// Relay buffering up to `capacity` changes per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for RelayChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InterContextChannel for RelayChannel {
    fn publish(&self, change: StorageChange) {
        let _ = self.sender.send(change);
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.sender.subscribe()
    }
}

/// Change bus of a single context: an intra-context broadcast plus the
/// shared inter-context channel.
#[derive(Clone)]
pub struct ChangeBus {
    context: ContextId,
    intra: broadcast::Sender<StorageChange>,
    inter: Arc<dyn InterContextChannel>,
}

impl ChangeBus {
    /// Bus of `context` relaying through `inter`.
    pub fn new(context: ContextId, inter: Arc<dyn InterContextChannel>) -> Self {
        let (intra, _receiver) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            context,
            intra,
            inter,
        }
    }

    /// Identifier of the owning context.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Publish a change on both channels, ignoring the absence of subscribers.
    pub fn publish(&self, key: &str, document: Option<Arc<Document>>) {
        let change = StorageChange {
            origin: self.context,
            key: key.to_string(),
            document,
        };
        let _ = self.intra.send(change.clone());
        self.inter.publish(change);
    }

    /// Changes written by this context.
    pub fn subscribe_intra(&self) -> broadcast::Receiver<StorageChange> {
        self.intra.subscribe()
    }

    /// Changes written by other contexts.
    pub fn subscribe_inter(&self) -> ForeignChanges {
        ForeignChanges {
            context: self.context,
            receiver: self.inter.subscribe(),
        }
    }
}

/// Inter-context receiver that skips the owning context's own writes.
pub struct ForeignChanges {
    context: ContextId,
    receiver: broadcast::Receiver<StorageChange>,
}

impl ForeignChanges {
    /// Wait for the next change written by another context.
    pub async fn recv(&mut self) -> Result<StorageChange, RecvError> {
        loop {
            let change = self.receiver.recv().await?;
            if change.origin != self.context {
                return Ok(change);
            }
        }
    }
}
