//! Organiser operations: replacing collections, forcing a reconciliation and
//! deciding pending requests.

use serde_json::Value;
use tracing::info;

use crate::{
    dao::{
        collections::collection_values,
        models::{CollectionKey, RecordId},
    },
    dto::collections::{CollectionResponse, ReplaceCollectionRequest, SyncStatusEntry},
    error::ServiceError,
    services::{
        mutator, reconciler,
        workflow_tracker::{self, WorkflowEntry},
    },
    state::{
        SharedState,
        workflow::{Decision, WorkflowKind},
    },
};

/// Replace a whole collection with the submitted records.
pub async fn replace_collection(
    state: &SharedState,
    key: &str,
    payload: ReplaceCollectionRequest,
) -> Result<CollectionResponse, ServiceError> {
    let key: CollectionKey = key.parse()?;
    let submitted = payload.records.len();
    let document = mutator::mutate_json(state.context(), key, payload.records).await?;
    let records: Value = collection_values(&document, key)
        .map_err(|err| ServiceError::Storage(err.to_string()))?;

    info!(collection = %key, submitted, "collection replaced");
    Ok(CollectionResponse {
        collection: key,
        records,
        sync: state.context().sync_status(key),
    })
}

/// Refresh one remote-backed collection right away.
pub async fn reconcile_collection(
    state: &SharedState,
    key: &str,
) -> Result<SyncStatusEntry, ServiceError> {
    let key: CollectionKey = key.parse()?;
    if !state.context().settings().remote_collections.contains(&key) {
        return Err(ServiceError::InvalidInput(format!(
            "`{key}` has no remote counterpart"
        )));
    }
    let status = reconciler::reconcile(state.context(), key).await;
    Ok((key, status, state.context().is_remote_backed(key)).into())
}

/// Approve or reject a pending request.
pub async fn decide_workflow(
    state: &SharedState,
    kind: &str,
    entity_id: &str,
    user_id: &str,
    decision: &str,
) -> Result<WorkflowEntry, ServiceError> {
    let kind: WorkflowKind = kind.parse()?;
    let decision: Decision = decision
        .parse()
        .map_err(|_| ServiceError::InvalidInput(format!("unknown decision `{decision}`")))?;
    let entry = workflow_tracker::decide(
        state.context(),
        kind,
        RecordId::from(entity_id),
        user_id,
        decision,
    )
    .await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dao::{models::WorkflowStatus, remote::MemoryRemote},
        state::{app::tests::memory_state, sync::SyncStatus},
    };

    #[tokio::test]
    async fn replaced_collection_is_normalised() {
        let state = memory_state(&MemoryRemote::new());
        let payload = ReplaceCollectionRequest {
            records: vec![json!({ "id": 1, "name": "Runners" })],
        };

        let response = replace_collection(&state, "communities", payload)
            .await
            .unwrap();

        assert_eq!(response.records[0]["location"], json!("Unknown"));
        assert_eq!(state.context().document().communities.len(), 1);
    }

    #[tokio::test]
    async fn malformed_records_are_invalid_input() {
        let state = memory_state(&MemoryRemote::new());
        let payload = ReplaceCollectionRequest {
            records: vec![json!({ "name": "no id" })],
        };

        let result = replace_collection(&state, "players", payload).await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert!(state.context().document().players.is_empty());
    }

    #[tokio::test]
    async fn reconcile_reports_the_outcome() {
        let remote = MemoryRemote::new();
        remote.seed("news", vec![json!({ "id": "n1", "title": "Finals" })]);
        let state = memory_state(&remote);

        let entry = reconcile_collection(&state, "news").await.unwrap();

        assert_eq!(entry.status, SyncStatus::RemoteBacked { count: 1 });
    }

    #[tokio::test]
    async fn decisions_follow_the_workflow() {
        let state = memory_state(&MemoryRemote::new());
        workflow_tracker::request(
            state.context(),
            WorkflowKind::TournamentRegistration,
            RecordId::Number(7),
            "U1",
        )
        .await
        .unwrap();

        let entry = decide_workflow(&state, "registrations", "7", "U1", "approve")
            .await
            .unwrap();
        assert_eq!(entry.status, WorkflowStatus::Confirmed);

        let again = decide_workflow(&state, "registrations", "7", "U1", "reject").await;
        assert!(matches!(again, Err(ServiceError::InvalidState(_))));

        let unknown = decide_workflow(&state, "registrations", "7", "U1", "maybe").await;
        assert!(matches!(unknown, Err(ServiceError::InvalidInput(_))));
    }
}
