//! 1:N identification endpoint

use axum::{extract::State, routing::post, Json, Router};

use super::ActionResponse;
use crate::AppState;

/// POST /api/identify
///
/// The result arrives later as an `identification_result` event.
pub async fn identify(State(state): State<AppState>) -> Json<ActionResponse> {
    Json(ActionResponse::from_start(
        state.flows.start_identification(),
        "Identification started",
    ))
}

pub fn identification_routes() -> Router<AppState> {
    Router::new().route("/api/identify", post(identify))
}
