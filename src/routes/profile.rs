use axum::{Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dto::profile::{ProfileInput, ProfileResponse, ProfileSaveResponse},
    error::AppError,
    services::{member_service, public_service},
    state::SharedState,
};

/// Profile endpoints of the device user.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/profile", get(get_profile).put(save_profile))
}

/// Return the device identity and its current profile.
pub async fn get_profile(
    State(state): State<SharedState>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(public_service::get_profile(&state)?))
}

/// Save the current profile and project it into players.
pub async fn save_profile(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ProfileInput>>,
) -> Result<Json<ProfileSaveResponse>, AppError> {
    Ok(Json(member_service::save_profile(&state, payload).await?))
}
