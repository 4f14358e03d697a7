// src/api/stream.rs — SSE mood stream
//
// GET /api/v1/meetings/:id/moods/stream delivers the current snapshot first,
// then live mood updates. A subscriber that falls behind its bounded queue
// receives a `lagged` event with the count of dropped updates and keeps
// reading from the newest data.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::api::{auth, types::ErrorResponse, ApiState};
use crate::core::types::MoodState;

pub async fn stream_moods(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorResponse>)> {
    auth::check_auth(&state, &headers)?;

    let subscription = state.broadcaster.subscribe(&id).await;
    let (snapshot, rx, heartbeat, guard) = subscription.into_parts();

    let hydrate = tokio_stream::iter(snapshot.into_iter().map(|mood| Ok(mood_event(&mood))));
    // The guard lives inside the stream so a client disconnect still retires
    // a finished meeting.
    let live = BroadcastStream::new(rx).map(move |msg| {
        let _ = &guard;
        match msg {
            Ok(mood) => Ok(mood_event(&mood)),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                Ok(Event::default().event("lagged").data(n.to_string()))
            }
        }
    });

    Ok(Sse::new(hydrate.chain(live)).keep_alive(KeepAlive::new().interval(heartbeat)))
}

fn mood_event(mood: &MoodState) -> Event {
    match Event::default().event("mood").json_data(mood) {
        Ok(event) => event,
        // MoodState serialization is infallible in practice
        Err(_) => Event::default().event("mood"),
    }
}
