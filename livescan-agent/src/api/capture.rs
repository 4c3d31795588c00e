//! Manual capture and 1:1 verification endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use super::{coerce_int, object_body, ActionResponse};
use crate::error::{ApiError, ApiResult};
use crate::models::MatchResult;
use crate::AppState;

/// POST /api/create_template
///
/// Body: `{"template_no": 1|2, "capture_type": "left_four"|"right_four"|"two_thumbs"}`.
/// Missing fields are a 400; everything else that prevents the capture
/// (busy, not initialized, bad slot or kind) is `success: false`.
pub async fn create_template(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ActionResponse>> {
    let body = object_body(payload)?;
    let (Some(template_no), Some(capture_type)) = (body.get("template_no"), body.get("capture_type"))
    else {
        return Err(ApiError::BadRequest(
            "template_no and capture_type are required".to_string(),
        ));
    };

    let template_no = coerce_int("template_no", template_no)?;
    let capture_type = capture_type
        .as_str()
        .ok_or_else(|| ApiError::BadRequest("capture_type must be a string".to_string()))?;

    let started = state.flows.start_manual_capture(template_no, capture_type);
    Ok(Json(ActionResponse::from_start(started, "Manual capture started")))
}

/// POST /api/match_templates
pub async fn match_templates(State(state): State<AppState>) -> Json<MatchResult> {
    Json(match state.flows.verify_slots() {
        Ok(result) => result,
        Err(e) => MatchResult::failure(e.to_string()),
    })
}

pub fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/api/create_template", post(create_template))
        .route("/api/match_templates", post(match_templates))
}
