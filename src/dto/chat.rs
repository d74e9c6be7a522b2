//! DTOs of the community chat endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    dao::models::ChatMessageRecord,
    dto::validation::{validate_identity, validate_not_blank},
    state::chat::ChatSource,
};

/// New message posted to a community channel.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(custom(function = validate_identity))]
    pub user_id: String,
    #[validate(length(min = 1, max = 80))]
    pub author: String,
    #[validate(length(min = 1, max = 2000), custom(function = validate_not_blank))]
    pub text: String,
}

/// Toggle of a user's reaction on a message.
#[derive(Debug, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(custom(function = validate_identity))]
    pub user_id: String,
    #[validate(length(min = 1, max = 16))]
    pub emoji: String,
}

/// Transcript of a community channel and where it was read from.
#[derive(Debug, Serialize)]
pub struct ChatTranscriptResponse {
    pub community_id: String,
    pub source: ChatSource,
    pub messages: Vec<ChatMessageRecord>,
}
