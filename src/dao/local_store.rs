use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    dao::{
        medium::StorageMedium,
        models::Document,
        storage::{LoadError, WriteError},
    },
    state::bus::ChangeBus,
};

/// Medium key holding the serialized [`Document`].
pub const DOCUMENT_KEY: &str = "sports_app_data";
/// Default soft ceiling for a single serialized value.
pub const DEFAULT_QUOTA_BYTES: usize = 8 * 1024 * 1024;

/// Acknowledgement of a successful, verified document write.
#[derive(Debug, Clone)]
pub struct SaveAck {
    /// Size of the persisted payload.
    pub bytes: usize,
    /// Document exactly as persisted.
    pub document: Arc<Document>,
}

/// Verified key/value persistence on top of a shared [`StorageMedium`].
///
/// Every successful write is read back and compared before it is reported,
/// then announced on the owning context's [`ChangeBus`].
#[derive(Clone)]
pub struct LocalStore {
    medium: Arc<dyn StorageMedium>,
    bus: ChangeBus,
    quota_bytes: usize,
}

impl LocalStore {
    /// Store writing to `medium` and announcing on `bus`.
    pub fn new(medium: Arc<dyn StorageMedium>, bus: ChangeBus, quota_bytes: usize) -> Self {
        Self {
            medium,
            bus,
            quota_bytes,
        }
    }

    /// Change bus the store publishes on.
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Read the persisted document.
    pub fn load(&self) -> Result<Document, LoadError> {
        self.load_json(DOCUMENT_KEY)
    }

    /// Persist the document and publish it once the write is verified.
    pub fn save(&self, document: &Document) -> Result<SaveAck, WriteError> {
        let bytes = self.write_verified(DOCUMENT_KEY, document)?;
        let document = Arc::new(document.clone());
        self.bus.publish(DOCUMENT_KEY, Some(document.clone()));
        Ok(SaveAck { bytes, document })
    }

    /// Read and decode an auxiliary key.
    pub fn load_json<T>(&self, key: &str) -> Result<T, LoadError>
    where
        T: DeserializeOwned,
    {
        let raw = self
            .medium
            .read(key)
            .map_err(|source| LoadError::Medium {
                key: key.to_string(),
                source,
            })?
            .ok_or_else(|| LoadError::NotFound {
                key: key.to_string(),
            })?;

        serde_json::from_str(&raw).map_err(|source| LoadError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    /// Persist an auxiliary key with the same guarantees as [`LocalStore::save`].
    pub fn save_json<T>(&self, key: &str, value: &T) -> Result<usize, WriteError>
    where
        T: ?Sized + Serialize,
    {
        let bytes = self.write_verified(key, value)?;
        self.bus.publish(key, None);
        Ok(bytes)
    }

    /// Delete an auxiliary key.
    pub fn remove(&self, key: &str) -> Result<(), WriteError> {
        self.medium
            .remove(key)
            .map_err(|source| WriteError::Medium {
                key: key.to_string(),
                source,
            })?;
        self.bus.publish(key, None);
        Ok(())
    }

    fn write_verified<T>(&self, key: &str, value: &T) -> Result<usize, WriteError>
    where
        T: ?Sized + Serialize,
    {
        let payload = serde_json::to_string(value).map_err(|source| WriteError::Serialization {
            key: key.to_string(),
            source,
        })?;

        if payload.len() > self.quota_bytes {
            return Err(WriteError::QuotaExceeded {
                size: payload.len(),
                limit: self.quota_bytes,
            });
        }

        let previous = match self.medium.read(key) {
            Ok(previous) => previous,
            Err(err) => {
                warn!(key, error = %err, "could not snapshot previous value before write");
                None
            }
        };

        self.medium
            .write(key, &payload)
            .map_err(|source| WriteError::Medium {
                key: key.to_string(),
                source,
            })?;

        match self.medium.read(key) {
            Ok(Some(stored)) if stored == payload => {
                debug!(key, bytes = payload.len(), "verified write");
                Ok(payload.len())
            }
            _ => {
                warn!(key, "read-back mismatch; restoring previous value");
                let restored = match previous {
                    Some(previous) => self.medium.write(key, &previous),
                    None => self.medium.remove(key),
                };
                if let Err(err) = restored {
                    warn!(key, error = %err, "failed to restore previous value");
                }
                Err(WriteError::VerifyMismatch {
                    key: key.to_string(),
                })
            }
        }
    }
}
