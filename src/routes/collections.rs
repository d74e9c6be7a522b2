use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::Document,
    dto::collections::{
        CollectionResponse, ReplaceCollectionRequest, SyncStatusEntry, SyncStatusResponse,
    },
    error::AppError,
    services::{admin_service, public_service},
    state::SharedState,
};

/// Collection, document and synchronisation endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/document", get(get_document))
        .route(
            "/api/collections/{key}",
            get(get_collection).put(replace_collection),
        )
        .route("/api/collections/{key}/reconcile", post(reconcile_collection))
        .route("/api/sync/status", get(get_sync_status))
}

/// Return the whole document as currently shown.
pub async fn get_document(State(state): State<SharedState>) -> Json<Document> {
    Json(public_service::get_document(&state))
}

/// Return one collection.
pub async fn get_collection(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<CollectionResponse>, AppError> {
    Ok(Json(public_service::get_collection(&state, &key)?))
}

/// Replace one collection.
pub async fn replace_collection(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Valid(Json(payload)): Valid<Json<ReplaceCollectionRequest>>,
) -> Result<Json<CollectionResponse>, AppError> {
    Ok(Json(
        admin_service::replace_collection(&state, &key, payload).await?,
    ))
}

/// Refresh one collection from the remote service.
pub async fn reconcile_collection(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<SyncStatusEntry>, AppError> {
    Ok(Json(admin_service::reconcile_collection(&state, &key).await?))
}

/// Return the reconciliation outcome of every collection.
pub async fn get_sync_status(State(state): State<SharedState>) -> Json<SyncStatusResponse> {
    Json(public_service::get_sync_status(&state))
}
