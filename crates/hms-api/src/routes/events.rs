//! Server-sent event stream of realtime updates.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};

use crate::auth::AuthUser;
use crate::events::rooms_for;
use crate::state::AppState;

pub async fn stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rooms = rooms_for(&user);
    tracing::debug!(user = %user.user_id, role = user.role.as_str(), "event stream opened");

    let events = BroadcastStream::new(state.events.subscribe()).filter_map(move |message| {
        match message {
            Ok(event) if event.reaches(&rooms) => Some(Ok(SseEvent::default()
                .event(event.name)
                .data(event.data.to_string()))),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagging");
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
