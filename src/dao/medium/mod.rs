mod file;
mod memory;

pub use file::FileMedium;
pub use memory::MemoryMedium;

use crate::dao::storage::MediumResult;

/// Durable key/value medium shared by every context of one profile.
///
/// Implementations must make `write` all-or-nothing: a reader observes either
/// the previous value or the new one, never a prefix of it.
pub trait StorageMedium: Send + Sync {
    /// Raw value under `key`, `None` when absent.
    fn read(&self, key: &str) -> MediumResult<Option<String>>;
    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> MediumResult<()>;
    /// Delete `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> MediumResult<()>;
}
