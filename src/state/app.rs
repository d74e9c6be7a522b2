use std::sync::Arc;

use dashmap::DashSet;
use tracing::debug;

use crate::{
    dao::models::RecordId,
    services::{chat_sync::ChatRooms, workflow_tracker::WorkflowTracker},
    state::{SharedContext, workflow::WorkflowKind},
};

/// Shared handle used as the router state.
pub type SharedState = Arc<AppState>;

/// State shared by the HTTP handlers of the daemon.
pub struct AppState {
    context: SharedContext,
    chat: ChatRooms,
    tracked: DashSet<(WorkflowKind, RecordId, String)>,
}

impl AppState {
    /// State around the daemon's context.
    pub fn new(context: SharedContext) -> SharedState {
        Arc::new(Self {
            context,
            chat: ChatRooms::default(),
            tracked: DashSet::new(),
        })
    }

    /// Context serving every request.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Chat rooms opened so far.
    pub fn chat(&self) -> &ChatRooms {
        &self.chat
    }

    /// Watch a request for status changes until the context closes. Pairs
    /// already tracked are left alone.
    pub fn track_workflow(&self, kind: WorkflowKind, entity_id: RecordId, user_id: &str) {
        let key = (kind, entity_id.clone(), user_id.to_string());
        if !self.tracked.insert(key) {
            return;
        }
        let poll = self.context.settings().workflow_poll;
        let task =
            WorkflowTracker::spawn(&self.context, kind, entity_id, user_id.to_string(), poll);
        self.context.attach_task(task);
        debug!(%kind, user = user_id, "tracking workflow request");
    }

    /// Leave every chat room and stop the context's background tasks.
    pub fn close(&self) {
        self.chat.close_all();
        self.context.close();
    }
}
