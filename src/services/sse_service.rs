use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    services::sse_events,
    state::{SharedContext, notice::Notice},
};

enum Step {
    Document,
    Notice(Notice),
    Skip,
    Closed,
}

/// Events of one context: a handshake, then every view change and notice
/// until the context goes away.
pub fn event_stream(
    context: &SharedContext,
) -> impl Stream<Item = ServerEvent> + Send + 'static + use<> {
    let mut documents = context.watch_document();
    let mut notices = context.notices().subscribe();
    let handshake = sse_events::handshake(context.id());

    stream! {
        if let Some(event) = handshake {
            yield event;
        }

        loop {
            let step = tokio::select! {
                changed = documents.changed() => match changed {
                    Ok(()) => Step::Document,
                    Err(_) => Step::Closed,
                },
                notice = notices.recv() => match notice {
                    Ok(notice) => Step::Notice(notice),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "SSE stream lagged behind notices");
                        Step::Skip
                    }
                    Err(RecvError::Closed) => Step::Closed,
                },
            };

            match step {
                Step::Document => {
                    let document = documents.borrow_and_update().clone();
                    if let Some(event) = sse_events::document_changed(&document) {
                        yield event;
                    }
                }
                Step::Notice(notice) => {
                    if let Some(event) = sse_events::notice(&notice) {
                        yield event;
                    }
                }
                Step::Skip => continue,
                Step::Closed => break,
            }
        }
    }
}

/// Convert a stream of server events into an SSE response, forwarding events
/// until the client disconnects.
pub fn to_sse_stream<S>(events: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ServerEvent> + Send + 'static,
{
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut events = Box::pin(events);
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = events.next() => {
                    let Some(payload) = next else {
                        break;
                    };
                    let mut event = Event::default().data(payload.data);
                    if let Some(name) = payload.event {
                        event = event.event(name);
                    }
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }
        info!("SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{collections::Players, local_store::tests::player, remote::MemoryRemote},
        services::mutator,
        state::{
            app::tests::memory_state,
            notice::{NoticeKind, NoticeLevel},
        },
    };

    #[tokio::test]
    async fn stream_reports_view_changes_and_notices() {
        let state = memory_state(&MemoryRemote::new());
        let context = state.context().clone();
        let events = {
            let borrowed = context.clone();
            event_stream(&borrowed)
        };
        let mut events = Box::pin(events);

        let handshake = events.next().await.unwrap();
        assert_eq!(handshake.event.as_deref(), Some("handshake"));

        mutator::mutate::<Players>(&context, vec![player(1, "U1", "Uma")])
            .await
            .unwrap();
        let changed = events.next().await.unwrap();
        assert_eq!(changed.event.as_deref(), Some("document.changed"));

        context.notify(Notice::new(
            NoticeLevel::Info,
            NoticeKind::WorkflowApproved,
            "approved",
        ));
        let notice = events.next().await.unwrap();
        assert_eq!(notice.event.as_deref(), Some("notice"));
        assert!(notice.data.contains("approved"));
    }
}
