//! DTOs of the collection and synchronisation endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{dao::models::CollectionKey, state::sync::SyncStatus};

/// Full replacement of one collection.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceCollectionRequest {
    #[validate(length(max = 10000))]
    pub records: Vec<Value>,
}

/// Records of one collection together with its latest reconciliation outcome.
#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub collection: CollectionKey,
    pub records: Value,
    pub sync: SyncStatus,
}

/// Reconciliation outcome of one collection.
#[derive(Debug, Serialize)]
pub struct SyncStatusEntry {
    pub collection: CollectionKey,
    pub status: SyncStatus,
    /// Whether any refresh of this session merged remote data.
    pub remote_backed: bool,
}

impl From<(CollectionKey, SyncStatus, bool)> for SyncStatusEntry {
    fn from((collection, status, remote_backed): (CollectionKey, SyncStatus, bool)) -> Self {
        Self {
            collection,
            status,
            remote_backed,
        }
    }
}

/// Latest reconciliation outcome of every collection attempted so far.
#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub collections: Vec<SyncStatusEntry>,
}
