use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::workflow::{WorkflowEntriesResponse, WorkflowRequestInput},
    error::AppError,
    services::{admin_service, member_service, public_service, workflow_tracker::WorkflowEntry},
    state::SharedState,
};

/// Community join and tournament registration endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/workflows/{kind}/{entity}/requests",
            post(file_request).get(list_requests),
        )
        .route(
            "/api/workflows/{kind}/{entity}/{user}/{decision}",
            post(decide_request),
        )
}

/// File a request for a community or a tournament.
pub async fn file_request(
    State(state): State<SharedState>,
    Path((kind, entity)): Path<(String, String)>,
    Valid(Json(payload)): Valid<Json<WorkflowRequestInput>>,
) -> Result<Json<WorkflowEntry>, AppError> {
    Ok(Json(
        member_service::request_workflow(&state, &kind, &entity, payload).await?,
    ))
}

/// List every request filed for a community or a tournament.
pub async fn list_requests(
    State(state): State<SharedState>,
    Path((kind, entity)): Path<(String, String)>,
) -> Result<Json<WorkflowEntriesResponse>, AppError> {
    Ok(Json(public_service::get_workflow_entries(
        &state, &kind, &entity,
    )?))
}

/// Approve or reject a pending request.
pub async fn decide_request(
    State(state): State<SharedState>,
    Path((kind, entity, user, decision)): Path<(String, String, String, String)>,
) -> Result<Json<WorkflowEntry>, AppError> {
    Ok(Json(
        admin_service::decide_workflow(&state, &kind, &entity, &user, &decision).await?,
    ))
}
