//! Server-Sent Events stream of capture notifications

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams every notification: `live_preview`, `capture_result`,
/// `enrollment_step`, `identification_step`, `identification_result`.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    livescan_common::sse::create_event_sse_stream("livescan-agent", &state.event_bus)
}
