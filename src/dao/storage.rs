use std::{io, path::PathBuf};

use thiserror::Error;

/// Result alias for raw medium operations.
pub type MediumResult<T> = Result<T, MediumError>;

/// Failure raised by a storage medium regardless of its backend.
#[derive(Debug, Error)]
pub enum MediumError {
    /// Filesystem access failed.
    #[error("storage medium I/O failed at `{}`", path.display())]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Stored bytes are not valid UTF-8 text.
    #[error("stored value for `{key}` is not valid UTF-8")]
    Encoding {
        /// Key whose value is unreadable.
        key: String,
    },
}

impl MediumError {
    /// Wrap an I/O failure together with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MediumError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A write that was refused or could not be confirmed. The previous
/// persisted value is left in place.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The serialized value is larger than the configured ceiling.
    #[error("quota exceeded: {size} bytes over the {limit} byte limit")]
    QuotaExceeded {
        /// Serialized size of the refused value.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// The value could not be serialized.
    #[error("failed to serialize value for `{key}`")]
    Serialization {
        /// Key involved.
        key: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// Reading back the written value did not return the same bytes.
    #[error("read-back verification failed for `{key}`")]
    VerifyMismatch {
        /// Key that was written.
        key: String,
    },
    /// The medium rejected the write.
    #[error("storage medium rejected write for `{key}`")]
    Medium {
        /// Key involved.
        key: String,
        /// Underlying failure.
        #[source]
        source: MediumError,
    },
}

/// Outcome of a read that produced no usable value.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Nothing is stored under the key yet.
    #[error("no value stored under `{key}`")]
    NotFound {
        /// Key that was read.
        key: String,
    },
    /// The stored value could not be parsed; callers treat it as "no data".
    #[error("stored value under `{key}` is corrupt")]
    Corrupt {
        /// Key involved.
        key: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// The medium itself could not be read.
    #[error("storage medium read failed for `{key}`")]
    Medium {
        /// Key involved.
        key: String,
        /// Underlying failure.
        #[source]
        source: MediumError,
    },
}
