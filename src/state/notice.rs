use serde::Serialize;
use tokio::sync::broadcast;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something degraded but data is safe.
    Warning,
    /// A change was lost or refused.
    Error,
}

/// What a notice is about, so the UI layer can pick its presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// A mutation could not be persisted; the optimistic update was withheld.
    MutationFailed,
    /// The remote service could not be reached; cached data is shown.
    RemoteUnavailable,
    /// A pending request was accepted.
    WorkflowApproved,
    /// A pending request was declined.
    WorkflowRejected,
    /// A request changed status in another way.
    WorkflowChanged,
}

/// Message meant for the person using the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// What happened.
    pub kind: NoticeKind,
    /// Text shown to the user.
    pub message: String,
}

impl Notice {
    /// Notice with the given severity, kind and text.
    pub fn new(level: NoticeLevel, kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
        }
    }
}

/// Broadcast hub for notices of one context.
pub struct NoticeHub {
    sender: broadcast::Sender<Notice>,
}

impl NoticeHub {
    /// Hub buffering up to `capacity` notices per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    /// Send a notice to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, notice: Notice) {
        let _ = self.sender.send(notice);
    }
}
