use dashmap::DashMap;

use super::StorageMedium;
use crate::dao::storage::MediumResult;

/// In-process medium, used by tests and by daemons running without a data directory.
#[derive(Default)]
pub struct MemoryMedium {
    entries: DashMap<String, String>,
}

impl MemoryMedium {
    /// Empty medium.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> MediumResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &str, value: &str) -> MediumResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> MediumResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
