//! Refreshes remote-backed collections from the remote service without ever
//! erasing what is already cached locally.

use std::{sync::Arc, time::Duration};

use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::{collections::collection_len, models::CollectionKey},
    services::mutator,
    state::{
        SharedContext, SyncContext,
        notice::{Notice, NoticeKind, NoticeLevel},
        sync::SyncStatus,
        task::PeriodicTask,
    },
};

/// Upper bound of the random delay added to each periodic refresh, as a
/// fraction of the refresh interval.
const JITTER_DIVISOR: u32 = 10;

/// Merge the remote copy of `key` into the local document.
///
/// A non-empty remote result replaces the collection; an empty or failed read
/// keeps whatever is cached. The outcome is recorded on the context and never
/// returned as an error.
pub async fn reconcile(context: &SyncContext, key: CollectionKey) -> SyncStatus {
    let kept = collection_len(&context.document(), key);

    let status = match context.remote().fetch(key.as_str()).await {
        Ok(records) if records.is_empty() => {
            debug!(collection = %key, kept, "remote returned no records; keeping local data");
            SyncStatus::RemoteEmpty { kept }
        }
        Ok(records) => {
            let fetched = records.len();
            match mutator::mutate_json(context, key, records).await {
                Ok(document) => {
                    let count = collection_len(&document, key);
                    debug!(collection = %key, fetched, count, "collection backed by remote");
                    SyncStatus::RemoteBacked { count }
                }
                Err(err) => {
                    warn!(collection = %key, error = %err, "failed to merge remote records");
                    SyncStatus::Failed {
                        message: err.to_string(),
                        kept,
                    }
                }
            }
        }
        Err(err) => {
            warn!(collection = %key, error = %err, "remote fetch failed; keeping local data");
            context.notify(Notice::new(
                NoticeLevel::Warning,
                NoticeKind::RemoteUnavailable,
                format!("Couldn't refresh {key} right now. Showing saved data."),
            ));
            SyncStatus::Failed {
                message: err.to_string(),
                kept,
            }
        }
    };

    context.set_sync_status(key, status.clone());
    status
}

/// Reconcile every remote-backed collection of the context, in order.
pub async fn reconcile_all(context: &SyncContext) -> Vec<(CollectionKey, SyncStatus)> {
    let mut statuses = Vec::with_capacity(context.settings().remote_collections.len());
    for key in context.settings().remote_collections.clone() {
        statuses.push((key, reconcile(context, key).await));
    }

    let backed = statuses
        .iter()
        .filter(|(key, _)| context.is_remote_backed(*key))
        .count();
    info!(
        collections = statuses.len(),
        backed, "reconciliation pass finished"
    );
    statuses
}

/// Refresh every remote-backed collection every `every`, plus a small random
/// delay so contexts opened together do not hit the remote at once.
pub fn spawn_periodic(context: &SharedContext, every: Duration) -> PeriodicTask {
    let weak = Arc::downgrade(context);
    let max_jitter_ms = (every / JITTER_DIVISOR).as_millis() as u64;

    PeriodicTask::spawn("periodic-reconcile", async move {
        loop {
            let jitter = Duration::from_millis(rng().random_range(0..=max_jitter_ms));
            sleep(every + jitter).await;

            let Some(context) = weak.upgrade() else {
                break;
            };
            reconcile_all(&context).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        dao::{
            collections::{Communities, Players},
            local_store::tests::player,
            medium::MemoryMedium,
            remote::MemoryRemote,
        },
        state::{ContextSettings, bus::RelayChannel},
    };

    fn context_with(remote: &MemoryRemote, collections: Vec<CollectionKey>) -> SharedContext {
        SyncContext::new(
            Arc::new(MemoryMedium::new()),
            Arc::new(RelayChannel::default()),
            Arc::new(remote.clone()),
            ContextSettings {
                remote_collections: collections,
                ..ContextSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn empty_remote_never_erases_local_players() {
        let remote = MemoryRemote::new();
        let context = context_with(&remote, vec![CollectionKey::Players]);
        mutator::mutate::<Players>(&context, vec![player(1, "A", "Alice")])
            .await
            .unwrap();

        let status = reconcile(&context, CollectionKey::Players).await;

        assert_eq!(status, SyncStatus::RemoteEmpty { kept: 1 });
        assert_eq!(
            context.store().load().unwrap().players,
            vec![player(1, "A", "Alice")]
        );
    }

    #[tokio::test]
    async fn unreachable_remote_keeps_data_and_warns() {
        let remote = MemoryRemote::unreachable();
        let context = context_with(&remote, vec![CollectionKey::Players]);
        mutator::mutate::<Players>(&context, vec![player(1, "A", "Alice")])
            .await
            .unwrap();
        let mut notices = context.notices().subscribe();

        let status = reconcile(&context, CollectionKey::Players).await;

        assert!(matches!(status, SyncStatus::Failed { kept: 1, .. }));
        assert_eq!(context.sync_status(CollectionKey::Players), status);
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert_eq!(notice.kind, NoticeKind::RemoteUnavailable);
        assert_eq!(context.document().players.len(), 1);
    }

    #[tokio::test]
    async fn merging_the_same_fetch_twice_is_idempotent() {
        let remote = MemoryRemote::new();
        remote.seed(
            "communities",
            vec![json!({ "id": 1, "name": "Runners", "members": ["U1"] })],
        );
        let context = context_with(&remote, vec![CollectionKey::Communities]);

        let first = reconcile(&context, CollectionKey::Communities).await;
        let persisted = context.store().load().unwrap();

        let mut changes = context.bus().subscribe_intra();
        let second = reconcile(&context, CollectionKey::Communities).await;

        assert_eq!(first, SyncStatus::RemoteBacked { count: 1 });
        assert_eq!(first, second);
        assert_eq!(context.store().load().unwrap(), persisted);
        assert!(changes.try_recv().is_err());
        assert_eq!(persisted.communities[0].location, "Unknown");
    }

    #[tokio::test]
    async fn remote_backed_mark_survives_empty_and_failed_refreshes() {
        let remote = MemoryRemote::new();
        remote.seed("news", vec![json!({ "id": "n1", "title": "Finals" })]);
        let context = context_with(&remote, vec![CollectionKey::News]);
        assert!(!context.is_remote_backed(CollectionKey::News));

        reconcile(&context, CollectionKey::News).await;
        assert!(context.is_remote_backed(CollectionKey::News));

        remote.seed("news", Vec::new());
        let empty = reconcile(&context, CollectionKey::News).await;
        assert_eq!(empty, SyncStatus::RemoteEmpty { kept: 1 });
        assert!(context.is_remote_backed(CollectionKey::News));

        remote.set_reachable(false);
        let failed = reconcile(&context, CollectionKey::News).await;
        assert!(matches!(failed, SyncStatus::Failed { kept: 1, .. }));
        assert!(context.is_remote_backed(CollectionKey::News));
        assert!(!context.is_remote_backed(CollectionKey::Teams));
    }

    #[tokio::test]
    async fn malformed_remote_records_do_not_replace_local_data() {
        let remote = MemoryRemote::new();
        remote.seed("players", vec![json!({ "name": "no id" })]);
        let context = context_with(&remote, vec![CollectionKey::Players]);
        mutator::mutate::<Players>(&context, vec![player(1, "A", "Alice")])
            .await
            .unwrap();

        let status = reconcile(&context, CollectionKey::Players).await;

        assert!(matches!(status, SyncStatus::Failed { kept: 1, .. }));
        assert_eq!(context.document().players.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_all_covers_configured_collections() {
        let remote = MemoryRemote::new();
        remote.seed("news", vec![json!({ "id": "n1", "title": "Finals" })]);
        let context = context_with(&remote, vec![CollectionKey::News, CollectionKey::Teams]);

        let statuses = reconcile_all(&context).await;

        assert_eq!(
            statuses,
            vec![
                (CollectionKey::News, SyncStatus::RemoteBacked { count: 1 }),
                (CollectionKey::Teams, SyncStatus::RemoteEmpty { kept: 0 }),
            ]
        );
        assert_eq!(context.sync_statuses(), statuses);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_picks_up_new_remote_data() {
        let remote = MemoryRemote::new();
        let context = context_with(&remote, vec![CollectionKey::Communities]);
        let _refresh = spawn_periodic(&context, Duration::from_secs(10));

        remote.seed("communities", vec![json!({ "id": 5, "name": "Climbers" })]);
        sleep(Duration::from_secs(12)).await;

        let communities = context.document().communities.clone();
        assert_eq!(communities.len(), 1);
        assert_eq!(
            context.sync_status(CollectionKey::Communities),
            SyncStatus::RemoteBacked { count: 1 }
        );
        assert!(matches!(
            mutator::CollectionMutator::<Communities>::new(context.clone())
                .records()
                .first(),
            Some(community) if community.name == "Climbers"
        ));
    }
}
