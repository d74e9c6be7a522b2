use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::ChatMessageRecord,
    dto::chat::{ChatTranscriptResponse, ReactionRequest, SendMessageRequest},
    error::AppError,
    services::{member_service, public_service},
    state::SharedState,
};

/// Community chat endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/chat/{community}", get(get_transcript))
        .route("/api/chat/{community}/messages", post(send_message))
        .route(
            "/api/chat/{community}/messages/{id}/reactions",
            post(toggle_reaction),
        )
}

/// Return the transcript of a community channel.
pub async fn get_transcript(
    State(state): State<SharedState>,
    Path(community): Path<String>,
) -> Result<Json<ChatTranscriptResponse>, AppError> {
    Ok(Json(
        public_service::get_chat_transcript(&state, &community).await?,
    ))
}

/// Post a message to a community channel.
pub async fn send_message(
    State(state): State<SharedState>,
    Path(community): Path<String>,
    Valid(Json(payload)): Valid<Json<SendMessageRequest>>,
) -> Result<Json<ChatMessageRecord>, AppError> {
    Ok(Json(
        member_service::send_message(&state, &community, payload).await?,
    ))
}

/// Toggle a reaction on a message.
pub async fn toggle_reaction(
    State(state): State<SharedState>,
    Path((community, id)): Path<(String, String)>,
    Valid(Json(payload)): Valid<Json<ReactionRequest>>,
) -> Result<Json<ChatMessageRecord>, AppError> {
    Ok(Json(
        member_service::toggle_reaction(&state, &community, &id, payload).await?,
    ))
}
