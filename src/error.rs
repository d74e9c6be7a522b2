use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::{
        models::UnknownCollection,
        storage::{LoadError, WriteError},
    },
    services::{
        chat_sync::ChatError, mutator::MutationError, profile_projector::ProfileError,
        workflow_tracker::WorkflowError,
    },
    state::workflow::UnknownWorkflow,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Local storage could not be read or written.
    #[error("storage unavailable: {0}")]
    Storage(String),
    /// Local storage has no room left for the change.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<WriteError> for ServiceError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::QuotaExceeded { .. } => ServiceError::QuotaExceeded(err.to_string()),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

impl From<LoadError> for ServiceError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            other => ServiceError::Storage(other.to_string()),
        }
    }
}

impl From<MutationError> for ServiceError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Write { source, .. } => source.into(),
            MutationError::Validation { collection, source } => {
                ServiceError::InvalidInput(format!("invalid records for `{collection}`: {source}"))
            }
        }
    }
}

impl From<ProfileError> for ServiceError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Cache(source) => source.into(),
            ProfileError::Projection(source) => source.into(),
        }
    }
}

impl From<WorkflowError> for ServiceError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            WorkflowError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
            WorkflowError::Mutation(source) => source.into(),
        }
    }
}

impl From<ChatError> for ServiceError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::MessageNotFound(_) => ServiceError::NotFound(err.to_string()),
        }
    }
}

impl From<UnknownCollection> for ServiceError {
    fn from(err: UnknownCollection) -> Self {
        ServiceError::NotFound(err.to_string())
    }
}

impl From<UnknownWorkflow> for ServiceError {
    fn from(err: UnknownWorkflow) -> Self {
        ServiceError::NotFound(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The change does not fit in local storage.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(message) => AppError::ServiceUnavailable(message),
            ServiceError::QuotaExceeded(message) => AppError::PayloadTooLarge(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
