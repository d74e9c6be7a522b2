/// Router state.
pub mod app;
/// Change notification between contexts.
pub mod bus;
/// Chat transcripts.
pub mod chat;
/// User-facing notices.
pub mod notice;
/// Reconciliation outcomes.
pub mod sync;
/// Background task handles.
pub mod task;
/// Request workflows and their transitions.
pub mod workflow;

pub use app::{AppState, SharedState};

use std::{
    sync::{Arc, Mutex as StdMutex, Weak},
    time::Duration,
};

use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, broadcast::error::RecvError, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        local_store::{DEFAULT_QUOTA_BYTES, DOCUMENT_KEY, LocalStore},
        medium::StorageMedium,
        models::{CollectionKey, Document},
        profile_cache::PROFILES_KEY,
        remote::RemoteService,
        storage::LoadError,
    },
    services::profile_projector,
};

use self::{
    bus::{ChangeBus, ContextId, InterContextChannel},
    notice::{Notice, NoticeHub},
    sync::SyncStatus,
    task::PeriodicTask,
};

/// Shared handle to a context.
pub type SharedContext = Arc<SyncContext>;

/// Default safety-net poll period of workflow trackers.
pub const DEFAULT_WORKFLOW_POLL: Duration = Duration::from_secs(2);

/// Tunables of a single context.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    /// Soft ceiling of a serialized value.
    pub quota_bytes: usize,
    /// Safety-net poll period of workflow trackers.
    pub workflow_poll: Duration,
    /// Collections that have a remote counterpart.
    pub remote_collections: Vec<CollectionKey>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
            workflow_poll: DEFAULT_WORKFLOW_POLL,
            remote_collections: CollectionKey::ALL.to_vec(),
        }
    }
}

/// State of one execution context (one open client of the profile).
///
/// Contexts share the storage medium and the inter-context channel; each one
/// owns its change bus, its in-memory view of the document and the background
/// tasks started on its behalf.
pub struct SyncContext {
    id: ContextId,
    store: LocalStore,
    remote: Arc<dyn RemoteService>,
    view: watch::Sender<Arc<Document>>,
    notices: NoticeHub,
    sync_status: DashMap<CollectionKey, SyncStatus>,
    remote_backed: DashSet<CollectionKey>,
    write_gate: Mutex<()>,
    settings: ContextSettings,
    tasks: StdMutex<Vec<PeriodicTask>>,
}

impl SyncContext {
    /// Build a context on top of the shared medium without starting any task.
    pub fn new(
        medium: Arc<dyn StorageMedium>,
        inter: Arc<dyn InterContextChannel>,
        remote: Arc<dyn RemoteService>,
        settings: ContextSettings,
    ) -> SharedContext {
        let id = Uuid::new_v4();
        let bus = ChangeBus::new(id, inter);
        let store = LocalStore::new(medium, bus, settings.quota_bytes);

        let initial = match store.load() {
            Ok(document) => document,
            Err(LoadError::NotFound { .. }) => Document::default(),
            Err(err) => {
                warn!(error = %err, "persisted document unreadable; starting from an empty view");
                Document::default()
            }
        };
        let (view, _rx) = watch::channel(Arc::new(initial));

        Arc::new(Self {
            id,
            store,
            remote,
            view,
            notices: NoticeHub::new(32),
            sync_status: DashMap::new(),
            remote_backed: DashSet::new(),
            write_gate: Mutex::new(()),
            settings,
            tasks: StdMutex::new(Vec::new()),
        })
    }

    /// Build a context, start listening to other contexts and project the
    /// cached profiles into `players`.
    pub async fn open(
        medium: Arc<dyn StorageMedium>,
        inter: Arc<dyn InterContextChannel>,
        remote: Arc<dyn RemoteService>,
        settings: ContextSettings,
    ) -> SharedContext {
        let context = Self::new(medium, inter, remote, settings);
        let listener = spawn_inter_context_listener(&context);
        context.attach_task(listener);

        if let Err(err) = profile_projector::project(&context).await {
            warn!(error = %err, "initial profile projection failed");
        }
        info!(context = %context.id, "sync context opened");
        context
    }

    /// Identifier of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Verified storage of this context.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Change bus of this context.
    pub fn bus(&self) -> &ChangeBus {
        self.store.bus()
    }

    /// Remote service used by this context.
    pub fn remote(&self) -> Arc<dyn RemoteService> {
        self.remote.clone()
    }

    /// Tunables of this context.
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Notices raised by this context.
    pub fn notices(&self) -> &NoticeHub {
        &self.notices
    }

    /// Publish a user-facing notice.
    pub fn notify(&self, notice: Notice) {
        self.notices.broadcast(notice);
    }

    /// Current in-memory view of the document.
    pub fn document(&self) -> Arc<Document> {
        self.view.borrow().clone()
    }

    /// Subscribe to in-memory view updates.
    pub fn watch_document(&self) -> watch::Receiver<Arc<Document>> {
        self.view.subscribe()
    }

    /// Replace the in-memory view. Only called with a persisted document.
    pub(crate) fn replace_view(&self, document: Arc<Document>) {
        self.view.send_replace(document);
    }

    /// Gate serializing the mutations issued from this context.
    pub(crate) fn write_gate(&self) -> &Mutex<()> {
        &self.write_gate
    }

    /// Latest reconciliation status of every collection attempted so far.
    pub fn sync_statuses(&self) -> Vec<(CollectionKey, SyncStatus)> {
        let mut statuses: Vec<_> = self
            .sync_status
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        statuses.sort_by_key(|(key, _)| *key);
        statuses
    }

    /// Latest reconciliation status of one collection.
    pub fn sync_status(&self, key: CollectionKey) -> SyncStatus {
        self.sync_status
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or(SyncStatus::Idle)
    }

    /// Whether remote data was merged into `key` at any point of this
    /// session. Later empty or failed refreshes do not clear the mark.
    pub fn is_remote_backed(&self, key: CollectionKey) -> bool {
        self.remote_backed.contains(&key)
    }

    pub(crate) fn set_sync_status(&self, key: CollectionKey, status: SyncStatus) {
        if status.is_remote_backed() {
            self.remote_backed.insert(key);
        }
        self.sync_status.insert(key, status);
    }

    /// Keep a background task alive for as long as the context is open.
    pub fn attach_task(&self, task: PeriodicTask) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(task),
            Err(poisoned) => poisoned.into_inner().push(task),
        }
    }

    /// Stop every background task owned by the context.
    pub fn close(&self) {
        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for mut task in tasks {
            task.cancel();
        }
        info!(context = %self.id, "sync context closed");
    }

    /// Re-read the persisted document into the view after another context
    /// wrote it. Unreadable or missing documents leave the view untouched.
    pub(crate) fn reload_view(&self) -> bool {
        match self.store.load() {
            Ok(document) => {
                if *self.document() != document {
                    self.replace_view(Arc::new(document));
                }
                true
            }
            Err(LoadError::NotFound { .. }) => false,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable document written by another context");
                false
            }
        }
    }
}

fn spawn_inter_context_listener(context: &SharedContext) -> PeriodicTask {
    let weak: Weak<SyncContext> = Arc::downgrade(context);
    let mut changes = context.bus().subscribe_inter();

    PeriodicTask::spawn("inter-context-listener", async move {
        loop {
            let key = match changes.recv().await {
                Ok(change) => change.key,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "inter-context listener lagged; reloading");
                    DOCUMENT_KEY.to_string()
                }
                Err(RecvError::Closed) => break,
            };

            let Some(context) = weak.upgrade() else {
                break;
            };

            let reload = match key.as_str() {
                DOCUMENT_KEY => context.reload_view(),
                PROFILES_KEY => true,
                _ => false,
            };
            if reload {
                if let Err(err) = profile_projector::project(&context).await {
                    warn!(error = %err, "profile projection after foreign change failed");
                }
            }
        }
    })
}
