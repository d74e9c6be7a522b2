use serde::Serialize;

/// Outcome of the latest reconciliation of one collection, consumed by the
/// UI layer. Remote errors end up here instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    /// No reconciliation attempted yet this session.
    Idle,
    /// The remote returned data and it now backs the collection.
    RemoteBacked {
        /// Records now in the collection.
        count: usize,
    },
    /// The remote returned nothing; cached records were kept.
    RemoteEmpty {
        /// Cached records left in place.
        kept: usize,
    },
    /// The remote could not be read; cached records were kept.
    Failed {
        /// Why the read failed.
        message: String,
        /// Cached records left in place.
        kept: usize,
    },
}

impl SyncStatus {
    /// Whether this outcome merged remote data.
    pub fn is_remote_backed(&self) -> bool {
        matches!(self, SyncStatus::RemoteBacked { .. })
    }
}
