use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::Document,
    dto::sse::{DocumentChangedEvent, Handshake, ServerEvent},
    state::{bus::ContextId, notice::Notice},
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_DOCUMENT_CHANGED: &str = "document.changed";
const EVENT_NOTICE: &str = "notice";

/// First event of every stream, naming the context it reports on.
pub fn handshake(context: ContextId) -> Option<ServerEvent> {
    let payload = Handshake {
        context,
        message: "event stream connected".to_string(),
    };
    to_event(EVENT_HANDSHAKE, &payload)
}

/// Per-collection counts after the in-memory view changed.
pub fn document_changed(document: &Document) -> Option<ServerEvent> {
    to_event(EVENT_DOCUMENT_CHANGED, &DocumentChangedEvent::from(document))
}

/// A user-facing notice, forwarded as is.
pub fn notice(notice: &Notice) -> Option<ServerEvent> {
    to_event(EVENT_NOTICE, notice)
}

fn to_event<T: Serialize>(event: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialise SSE payload");
            None
        }
    }
}
