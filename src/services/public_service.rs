//! Read-only projections of the local document and its side stores.

use crate::{
    dao::{
        collections::collection_values,
        models::{CollectionKey, Document, RecordId},
        profile_cache::ProfileCache,
    },
    dto::{
        chat::ChatTranscriptResponse,
        collections::{CollectionResponse, SyncStatusEntry, SyncStatusResponse},
        profile::ProfileResponse,
        workflow::WorkflowEntriesResponse,
    },
    error::ServiceError,
    services::workflow_tracker,
    state::{SharedState, workflow::WorkflowKind},
};

/// Return the document as currently shown by the context.
pub fn get_document(state: &SharedState) -> Document {
    (*state.context().document()).clone()
}

/// Return one collection and its latest reconciliation outcome.
pub fn get_collection(state: &SharedState, key: &str) -> Result<CollectionResponse, ServiceError> {
    let key: CollectionKey = key.parse()?;
    let records = collection_values(&state.context().document(), key)
        .map_err(|err| ServiceError::Storage(err.to_string()))?;
    Ok(CollectionResponse {
        collection: key,
        records,
        sync: state.context().sync_status(key),
    })
}

/// Return the reconciliation outcome of every collection attempted so far.
pub fn get_sync_status(state: &SharedState) -> SyncStatusResponse {
    let context = state.context();
    let collections = context
        .sync_statuses()
        .into_iter()
        .map(|(key, status)| {
            let remote_backed = context.is_remote_backed(key);
            SyncStatusEntry::from((key, status, remote_backed))
        })
        .collect();
    SyncStatusResponse { collections }
}

/// Return the device identity, minting it on first use, and its profile.
pub fn get_profile(state: &SharedState) -> Result<ProfileResponse, ServiceError> {
    let cache = ProfileCache::new(state.context().store());
    Ok(ProfileResponse {
        user_id: cache.user_id()?,
        profile: cache.current_profile(),
    })
}

/// Return every request filed for a community or a tournament.
pub fn get_workflow_entries(
    state: &SharedState,
    kind: &str,
    entity_id: &str,
) -> Result<WorkflowEntriesResponse, ServiceError> {
    let kind: WorkflowKind = kind.parse()?;
    let entity_id = RecordId::from(entity_id);
    let entries = workflow_tracker::entries(&state.context().document(), kind, &entity_id);
    Ok(WorkflowEntriesResponse { entries })
}

/// Return the transcript of a community channel, opening the room on first use.
pub async fn get_chat_transcript(
    state: &SharedState,
    community_id: &str,
) -> Result<ChatTranscriptResponse, ServiceError> {
    if community_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("community id is blank".into()));
    }
    let room = state.chat().open(state.context(), community_id).await;
    Ok(ChatTranscriptResponse {
        community_id: room.community_id().to_string(),
        source: room.source(),
        messages: room.messages().await,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dao::{collections::Players, local_store::tests::player, remote::MemoryRemote},
        services::mutator,
        state::{app::tests::memory_state, chat::ChatSource, sync::SyncStatus},
    };

    #[tokio::test]
    async fn collection_is_served_with_its_sync_status() {
        let state = memory_state(&MemoryRemote::new());
        mutator::mutate::<Players>(state.context(), vec![player(1, "U1", "Uma")])
            .await
            .unwrap();

        let response = get_collection(&state, "players").unwrap();

        assert_eq!(response.collection, CollectionKey::Players);
        assert_eq!(response.records[0]["name"], json!("Uma"));
        assert_eq!(response.sync, SyncStatus::Idle);
    }

    #[test]
    fn unknown_collection_is_not_found() {
        let state = memory_state(&MemoryRemote::new());
        assert!(matches!(
            get_collection(&state, "scores"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn identity_is_stable_across_reads() {
        let state = memory_state(&MemoryRemote::new());
        let first = get_profile(&state).unwrap();
        let second = get_profile(&state).unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert!(first.profile.is_none());
    }

    #[tokio::test]
    async fn offline_transcript_is_local() {
        let state = memory_state(&MemoryRemote::unreachable());
        let transcript = get_chat_transcript(&state, "c1").await.unwrap();

        assert_eq!(transcript.source, ChatSource::Local);
        assert_eq!(transcript.messages.len(), 3);
    }
}
