use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

/// GET /v1/search/{id}/stream
/// Per-search event stream. Connecting joins the search's room; leaving is
/// simply disconnecting. Lagged events are dropped (at-most-once delivery);
/// clients reconcile via the progress endpoint.
pub async fn search_stream(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.publisher().join(search_id).await;

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let name = event.name();
                match serde_json::to_string(&event) {
                    Ok(data) => Some(Ok(Event::default().event(name).data(data))),
                    Err(_) => None,
                }
            }
            // Receiver lagged behind; skip and keep streaming
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /v1/stream
/// System-wide notices, decoupled from per-search rooms
pub async fn system_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.publisher().subscribe_system();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(notice) => match serde_json::to_string(&notice) {
                Ok(data) => Some(Ok(Event::default().event("notice").data(data))),
                Err(_) => None,
            },
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
