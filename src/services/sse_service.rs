use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::session_service,
    state::{SessionEntry, SharedState},
};

/// Subscribe to the shared public board stream.
pub fn subscribe_board(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Open an admin stream: register a locked session for `department` and
/// subscribe to its private hub.
///
/// The subscription opens before any event is emitted, so the handshake that
/// follows is never missed.
pub fn open_session_stream(
    state: &SharedState,
    department: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, Uuid, Arc<SessionEntry>), ServiceError> {
    let (id, entry) = session_service::open_session(state, department)?;
    let receiver = entry.events.subscribe();
    Ok((receiver, id, entry))
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Board,
    /// Carries a clone of the shared application state so teardown logic can
    /// discard the session after the spawned task completes. Cloning
    /// `SharedState` is cheap because it is just bumping the inner `Arc`.
    Session(SharedState, Uuid),
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Board => tracing::info!("public board SSE stream disconnected"),
            StreamKind::Session(state, id) => {
                // Own the necessary state inside the spawned task so we can
                // clean up even if the request context has already dropped.
                session_service::close_session(&state, id);
                tracing::info!(session = %id, "admin SSE stream disconnected");
            }
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
