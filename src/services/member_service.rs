//! Operations of the person using the device: profile, requests and chat.

use tracing::info;

use crate::{
    dao::{
        models::{ChatMessageRecord, ProfileRecord, RecordId},
        profile_cache::ProfileCache,
    },
    dto::{
        chat::{ReactionRequest, SendMessageRequest},
        profile::{ProfileInput, ProfileSaveResponse},
        workflow::WorkflowRequestInput,
    },
    error::ServiceError,
    services::{
        profile_projector,
        workflow_tracker::{self, WorkflowEntry},
    },
    state::{SharedState, workflow::WorkflowKind},
};

/// Save the current profile and project it into `players`.
pub async fn save_profile(
    state: &SharedState,
    payload: ProfileInput,
) -> Result<ProfileSaveResponse, ServiceError> {
    let mut profile = ProfileRecord::from(payload);
    if profile.user_id.is_empty() {
        profile.user_id = ProfileCache::new(state.context().store()).user_id()?;
    }
    let report = profile_projector::save_profile(state.context(), profile.clone()).await?;
    info!(user = %profile.user_id, "profile saved");
    Ok(ProfileSaveResponse {
        profile,
        projection: report.into(),
    })
}

/// File a request and start watching it for status changes.
pub async fn request_workflow(
    state: &SharedState,
    kind: &str,
    entity_id: &str,
    payload: WorkflowRequestInput,
) -> Result<WorkflowEntry, ServiceError> {
    let kind: WorkflowKind = kind.parse()?;
    let entity_id = RecordId::from(entity_id);
    let entry =
        workflow_tracker::request(state.context(), kind, entity_id.clone(), &payload.user_id)
            .await?;
    state.track_workflow(kind, entity_id, &payload.user_id);
    Ok(entry)
}

/// Post a message to a community channel.
pub async fn send_message(
    state: &SharedState,
    community_id: &str,
    payload: SendMessageRequest,
) -> Result<ChatMessageRecord, ServiceError> {
    let room = state.chat().open(state.context(), community_id).await;
    Ok(room
        .send(&payload.user_id, payload.author.trim(), payload.text.trim())
        .await)
}

/// Toggle a reaction on a message of a community channel.
pub async fn toggle_reaction(
    state: &SharedState,
    community_id: &str,
    message_id: &str,
    payload: ReactionRequest,
) -> Result<ChatMessageRecord, ServiceError> {
    let room = state.chat().open(state.context(), community_id).await;
    Ok(room
        .toggle_reaction(message_id, &payload.emoji, &payload.user_id)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{models::WorkflowStatus, remote::MemoryRemote},
        state::app::tests::memory_state,
    };

    fn profile_input(user_id: Option<&str>, name: &str) -> ProfileInput {
        ProfileInput {
            user_id: user_id.map(str::to_string),
            name: name.to_string(),
            email: None,
            city: Some("Lyon".into()),
            state: None,
            sport: Some("Football".into()),
            position: None,
            age: Some(27),
            bio: None,
            image: None,
            matches_played: 3,
        }
    }

    #[tokio::test]
    async fn saved_profile_appears_in_players() {
        let state = memory_state(&MemoryRemote::new());

        let saved = save_profile(&state, profile_input(None, " Uma "))
            .await
            .unwrap();

        assert!(!saved.profile.user_id.is_empty());
        assert_eq!(saved.projection.added, 1);
        let players = state.context().document().players.clone();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Uma");
        assert_eq!(players[0].user_id.as_deref(), Some(saved.profile.user_id.as_str()));
    }

    #[tokio::test]
    async fn resaving_a_profile_updates_the_same_player() {
        let state = memory_state(&MemoryRemote::new());
        save_profile(&state, profile_input(Some("U1"), "Uma"))
            .await
            .unwrap();

        let saved = save_profile(&state, profile_input(Some("U1"), "Uma B."))
            .await
            .unwrap();

        assert_eq!(saved.projection.added, 0);
        let players = state.context().document().players.clone();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Uma B.");
    }

    #[tokio::test]
    async fn requesting_twice_returns_the_same_pending_entry() {
        let state = memory_state(&MemoryRemote::new());
        let input = || WorkflowRequestInput {
            user_id: "U1".into(),
        };

        let first = request_workflow(&state, "community-join", "3", input())
            .await
            .unwrap();
        let second = request_workflow(&state, "community-join", "3", input())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.status, WorkflowStatus::Pending);
        assert_eq!(state.context().document().community_requests.len(), 1);
        state.close();
    }

    #[tokio::test]
    async fn reactions_on_unknown_messages_are_not_found() {
        let state = memory_state(&MemoryRemote::unreachable());
        let sent = send_message(
            &state,
            "c1",
            SendMessageRequest {
                user_id: "U1".into(),
                author: "Uma".into(),
                text: "hello".into(),
            },
        )
        .await
        .unwrap();

        let reaction = || ReactionRequest {
            user_id: "U2".into(),
            emoji: "👍".into(),
        };
        let toggled = toggle_reaction(&state, "c1", &sent.id, reaction())
            .await
            .unwrap();
        assert_eq!(toggled.reactions.len(), 1);

        let missing = toggle_reaction(&state, "c1", "msg_missing", reaction()).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }
}
