//! Enrollment endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::ActionResponse;
use crate::error::ApiResult;
use crate::models::EnrollmentPayload;
use crate::AppState;

/// GET /api/get_enrollment_data response
#[derive(Debug, Serialize)]
pub struct EnrollmentDataResponse {
    pub success: bool,
    #[serde(flatten)]
    pub data: EnrollmentPayload,
}

/// POST /api/start_enrollment
pub async fn start_enrollment(State(state): State<AppState>) -> Json<ActionResponse> {
    Json(ActionResponse::from_start(
        state.flows.start_enrollment(),
        "Enrollment started",
    ))
}

/// GET /api/get_enrollment_data
///
/// Returns the ten templates and thirteen images base64-encoded, then
/// forgets them. 404 until the enrollment record is complete.
pub async fn get_enrollment_data(
    State(state): State<AppState>,
) -> ApiResult<Json<EnrollmentDataResponse>> {
    let record = state.flows.take_enrollment()?;
    Ok(Json(EnrollmentDataResponse {
        success: true,
        data: record.to_payload(),
    }))
}

pub fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/start_enrollment", post(start_enrollment))
        .route("/api/get_enrollment_data", get(get_enrollment_data))
}
