//! Error types shared by the remote service backends.

use std::error::Error;

use thiserror::Error;

/// Convenient result alias returning [`RemoteError`] failures.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures that can occur while talking to the remote authoritative service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service could not be reached at all.
    #[error("remote service unreachable")]
    Unreachable,
    /// A request could not be sent or its response not received.
    #[error("failed to send remote request to `{path}`")]
    Transport {
        /// Endpoint path of the request.
        path: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The service answered with an unexpected status code.
    #[error("unexpected remote response status {status} for `{path}`")]
    Status {
        /// Endpoint path of the request.
        path: String,
        /// HTTP status received.
        status: u16,
    },
    /// The response body could not be decoded.
    #[error("failed to decode remote response for `{path}`")]
    Decode {
        /// Endpoint path of the request.
        path: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A record sent to the service lacks the `id` the endpoint needs.
    #[error("record sent to `{collection}` has no id")]
    MissingId {
        /// Target collection.
        collection: String,
    },
}

impl RemoteError {
    /// Wrap a transport failure.
    pub fn transport(path: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        RemoteError::Transport {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a decoding failure.
    pub fn decode(path: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        RemoteError::Decode {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
