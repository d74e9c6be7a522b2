//! Transactional read-merge-write access to the collections of the document.
//!
//! Every write to the persisted document goes through [`commit`]: the
//! persisted document is re-read (never the in-memory view), the target
//! collection is replaced by its validated new value, the result is saved and
//! only then does the context's view change. Nothing awaits between the
//! re-read and the save, which keeps concurrent mutations of different
//! collections from clobbering each other.

use std::{marker::PhantomData, sync::Arc};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    dao::{
        collections::{Collection, replace_dynamic},
        models::{CollectionKey, Document},
        storage::{LoadError, WriteError},
    },
    state::{
        SharedContext, SyncContext,
        notice::{Notice, NoticeKind, NoticeLevel},
    },
};

/// A mutation that was not applied. The in-memory view is unchanged.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The new document could not be persisted.
    #[error("failed to persist `{collection}`")]
    Write {
        /// Collection being changed.
        collection: CollectionKey,
        /// Underlying storage failure.
        #[source]
        source: WriteError,
    },
    /// The submitted records do not match the collection's shape.
    #[error("invalid records for `{collection}`")]
    Validation {
        /// Collection being changed.
        collection: CollectionKey,
        /// First decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// Mutation entry point bound to one collection.
pub struct CollectionMutator<C: Collection> {
    context: SharedContext,
    _collection: PhantomData<C>,
}

impl<C: Collection> CollectionMutator<C> {
    /// Mutator writing through `context`.
    pub fn new(context: SharedContext) -> Self {
        Self {
            context,
            _collection: PhantomData,
        }
    }

    /// Records of the collection as currently shown by the context.
    pub fn records(&self) -> Vec<C::Record> {
        C::slot(&self.context.document()).clone()
    }

    /// Replace the collection with `records`.
    pub async fn mutate(&self, records: Vec<C::Record>) -> Result<Arc<Document>, MutationError> {
        mutate::<C>(&self.context, records).await
    }

    /// Derive the new collection from its freshly re-read persisted value.
    pub async fn update<F>(&self, change: F) -> Result<Arc<Document>, MutationError>
    where
        F: FnOnce(&[C::Record]) -> Vec<C::Record>,
    {
        update::<C, F>(&self.context, change).await
    }
}

/// Replace collection `C` with the validated form of `records`.
pub async fn mutate<C: Collection>(
    context: &SyncContext,
    records: Vec<C::Record>,
) -> Result<Arc<Document>, MutationError> {
    update::<C, _>(context, move |_| records).await
}

/// Replace collection `C` with the result of `change` applied to its
/// persisted value.
pub async fn update<C, F>(context: &SyncContext, change: F) -> Result<Arc<Document>, MutationError>
where
    C: Collection,
    F: FnOnce(&[C::Record]) -> Vec<C::Record>,
{
    commit(context, C::KEY, |document| {
        let next = C::validate(change(C::slot(document)));
        *C::slot_mut(document) = next;
        Ok(())
    })
    .await
}

/// Replace a collection, named at runtime, with records given as JSON.
pub async fn mutate_json(
    context: &SyncContext,
    key: CollectionKey,
    values: Vec<Value>,
) -> Result<Arc<Document>, MutationError> {
    commit(context, key, |document| {
        replace_dynamic(document, key, values).map_err(|source| MutationError::Validation {
            collection: key,
            source,
        })
    })
    .await
}

/// Change several collections of the persisted document in a single write.
/// `change` must leave every collection it touches validated; `key` names
/// the collection reported on failure.
pub(crate) async fn update_document<F>(
    context: &SyncContext,
    key: CollectionKey,
    change: F,
) -> Result<Arc<Document>, MutationError>
where
    F: FnOnce(&mut Document),
{
    commit(context, key, |document| {
        change(document);
        Ok(())
    })
    .await
}

async fn commit<F>(
    context: &SyncContext,
    key: CollectionKey,
    apply: F,
) -> Result<Arc<Document>, MutationError>
where
    F: FnOnce(&mut Document) -> Result<(), MutationError>,
{
    let _gate = context.write_gate().lock().await;

    let (current, origin) = read_persisted(context);
    let mut next = current.clone();
    if let Err(err) = apply(&mut next) {
        warn!(collection = %key, error = %err, "rejected mutation");
        context.notify(failure_notice(key, &err));
        return Err(err);
    }

    // A missing document is created on first write, even when unchanged.
    if next == current && origin != Persisted::Missing {
        debug!(collection = %key, "mutation is a no-op; skipping write");
        let current = Arc::new(current);
        if origin == Persisted::Stored && *context.document() != *current {
            context.replace_view(current.clone());
        }
        return Ok(current);
    }

    match context.store().save(&next) {
        Ok(ack) => {
            debug!(collection = %key, bytes = ack.bytes, "mutation persisted");
            context.replace_view(ack.document.clone());
            Ok(ack.document)
        }
        Err(source) => {
            let err = MutationError::Write {
                collection: key,
                source,
            };
            warn!(collection = %key, error = %err, "mutation not persisted; view left unchanged");
            context.notify(failure_notice(key, &err));
            Err(err)
        }
    }
}

/// Where the base document of a mutation was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persisted {
    Stored,
    Missing,
    Unreadable,
}

/// Latest persisted document. A corrupt blob falls back to the last good view
/// so the write does not wipe the other collections.
fn read_persisted(context: &SyncContext) -> (Document, Persisted) {
    match context.store().load() {
        Ok(document) => (document, Persisted::Stored),
        Err(LoadError::NotFound { .. }) => (Document::default(), Persisted::Missing),
        Err(err) => {
            warn!(error = %err, "persisted document unreadable; merging into the current view");
            ((*context.document()).clone(), Persisted::Unreadable)
        }
    }
}

fn failure_notice(key: CollectionKey, err: &MutationError) -> Notice {
    let message = match err {
        MutationError::Write {
            source: WriteError::QuotaExceeded { .. },
            ..
        } => format!(
            "Local storage is full, so changes to {key} were not saved. Remove some items or images and try again."
        ),
        MutationError::Write { .. } => {
            format!("Changes to {key} could not be saved. Please try again.")
        }
        MutationError::Validation { .. } => {
            format!("Changes to {key} were rejected because some records are malformed.")
        }
    };
    Notice::new(NoticeLevel::Error, NoticeKind::MutationFailed, message)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        dao::{
            collections::{Communities, Players},
            local_store::{DOCUMENT_KEY, tests::player},
            medium::{MemoryMedium, StorageMedium},
            models::CommunityRecord,
            remote::MemoryRemote,
        },
        state::{ContextSettings, bus::RelayChannel},
    };

    fn context_on(medium: Arc<MemoryMedium>, relay: Arc<RelayChannel>) -> SharedContext {
        SyncContext::new(
            medium,
            relay,
            Arc::new(MemoryRemote::unreachable()),
            ContextSettings::default(),
        )
    }

    fn community(id: i64, name: &str) -> CommunityRecord {
        serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
    }

    #[tokio::test]
    async fn mutate_then_load_returns_validated_records() {
        let context = context_on(Arc::new(MemoryMedium::new()), Arc::default());
        let mutator = CollectionMutator::<Players>::new(context.clone());

        let mut nameless = player(2, "B", "");
        nameless.city = Some("Austin".into());
        mutator
            .mutate(vec![player(1, "A", "Alice"), nameless.clone()])
            .await
            .unwrap();

        let persisted = context.store().load().unwrap();
        assert_eq!(
            persisted.players,
            Players::validate(vec![player(1, "A", "Alice"), nameless])
        );
        assert_eq!(persisted.players[1].name, "Unknown Player");
        assert_eq!(*context.document(), persisted);
    }

    #[tokio::test]
    async fn unchanged_value_is_not_rewritten() {
        let context = context_on(Arc::new(MemoryMedium::new()), Arc::default());
        mutate::<Players>(&context, vec![player(1, "A", "Alice")])
            .await
            .unwrap();

        let mut changes = context.bus().subscribe_intra();
        mutate::<Players>(&context, vec![player(1, "A", "Alice")])
            .await
            .unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn first_write_creates_document_even_when_empty() {
        let context = context_on(Arc::new(MemoryMedium::new()), Arc::default());
        assert!(matches!(
            context.store().load(),
            Err(LoadError::NotFound { .. })
        ));

        mutate::<Players>(&context, Vec::new()).await.unwrap();

        let persisted = context.store().load().unwrap();
        assert!(persisted.players.is_empty());
        assert_eq!(persisted, Document::default());
    }

    #[tokio::test]
    async fn failed_save_keeps_view_and_notifies() {
        let medium = Arc::new(MemoryMedium::new());
        let settings = ContextSettings {
            quota_bytes: 300,
            ..ContextSettings::default()
        };
        let context = SyncContext::new(
            medium,
            Arc::new(RelayChannel::default()),
            Arc::new(MemoryRemote::unreachable()),
            settings,
        );
        let mut notices = context.notices().subscribe();

        mutate::<Players>(&context, vec![player(1, "A", "Al")])
            .await
            .unwrap();
        let before = context.document();

        let crowd = (0..20).map(|id| player(id, "U", "Someone")).collect();
        let err = mutate::<Players>(&context, crowd).await.unwrap_err();

        assert!(matches!(
            err,
            MutationError::Write {
                source: WriteError::QuotaExceeded { .. },
                ..
            }
        ));
        assert_eq!(context.document(), before);
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::MutationFailed);
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let context = context_on(Arc::new(MemoryMedium::new()), Arc::default());
        let err = mutate_json(&context, CollectionKey::Players, vec![json!({ "name": "x" })])
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Validation { .. }));
        assert!(context.store().load().is_err());
    }

    #[tokio::test]
    async fn corrupt_blob_merges_into_last_good_view() {
        let medium = Arc::new(MemoryMedium::new());
        let context = context_on(medium.clone(), Arc::default());
        mutate::<Communities>(&context, vec![community(1, "Runners")])
            .await
            .unwrap();

        medium.write(DOCUMENT_KEY, "not json").unwrap();
        mutate::<Players>(&context, vec![player(1, "A", "Alice")])
            .await
            .unwrap();

        let persisted = context.store().load().unwrap();
        assert_eq!(persisted.communities.len(), 1);
        assert_eq!(persisted.players.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_contexts_keep_both_collections() {
        let medium = Arc::new(MemoryMedium::new());
        let relay = Arc::new(RelayChannel::default());
        let admin = context_on(medium.clone(), relay.clone());
        let background = context_on(medium.clone(), relay);

        let (players, communities) = tokio::join!(
            mutate::<Players>(&admin, vec![player(1, "A", "Alice")]),
            mutate::<Communities>(&background, vec![community(9, "Climbers")]),
        );
        players.unwrap();
        communities.unwrap();

        let persisted = admin.store().load().unwrap();
        assert_eq!(persisted.players, vec![player(1, "A", "Alice")]);
        assert_eq!(persisted.communities[0].name, "Climbers");
    }

    #[tokio::test]
    async fn update_sees_writes_from_other_contexts() {
        let medium = Arc::new(MemoryMedium::new());
        let relay = Arc::new(RelayChannel::default());
        let first = context_on(medium.clone(), relay.clone());
        let second = context_on(medium, relay);

        mutate::<Players>(&first, vec![player(1, "A", "Alice")])
            .await
            .unwrap();
        // `second` still shows an empty view but appends to the persisted list.
        assert!(second.document().players.is_empty());
        update::<Players, _>(&second, |players| {
            let mut players = players.to_vec();
            players.push(player(2, "B", "Bob"));
            players
        })
        .await
        .unwrap();

        let persisted = first.store().load().unwrap();
        assert_eq!(persisted.players.len(), 2);
        assert_eq!(second.document().players.len(), 2);
    }
}
