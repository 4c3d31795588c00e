//! Device and session endpoints
//!
//! GET /api/status, POST /api/init, POST /api/config, POST /api/cancel

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use super::{coerce_int, object_body, ActionResponse};
use crate::error::{ApiError, ApiResult};
use crate::flows::SettingsUpdate;
use crate::models::CaptureSettings;
use crate::session::SessionStatus;
use crate::AppState;

/// POST /api/config response
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub message: String,
    pub settings: CaptureSettings,
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.flows.session().status())
}

/// POST /api/init
///
/// Safe to repeat; a failure is reported in the body, not the status code.
pub async fn init_device(State(state): State<AppState>) -> Json<ActionResponse> {
    Json(match state.flows.initialize() {
        Ok(()) => ActionResponse::ok("All systems initialized"),
        Err(e) => ActionResponse::rejected(&e),
    })
}

/// POST /api/config
///
/// Accepts any subset of `quality_threshold`, `capture_timeout` and
/// `fog_removal`. Values are coerced (`"50"` is a valid threshold); a value
/// that cannot be coerced rejects the whole request and changes nothing.
pub async fn update_config(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ConfigResponse>> {
    let body = object_body(payload)?;
    let mut update = SettingsUpdate::default();

    if let Some(value) = body.get("quality_threshold") {
        let threshold = coerce_int("quality_threshold", value)?;
        update.quality_threshold = Some(i32::try_from(threshold).map_err(|_| {
            ApiError::BadRequest("quality_threshold out of range".to_string())
        })?);
    }
    if let Some(value) = body.get("capture_timeout") {
        let timeout = coerce_int("capture_timeout", value)?;
        update.capture_timeout_secs = Some(u64::try_from(timeout).map_err(|_| {
            ApiError::BadRequest("capture_timeout must not be negative".to_string())
        })?);
    }
    if let Some(value) = body.get("fog_removal") {
        update.fog_removal = Some(coerce_bool("fog_removal", value)?);
    }

    let settings = state.flows.configure(update);
    Ok(Json(ConfigResponse {
        success: true,
        message: "Settings updated".to_string(),
        settings,
    }))
}

/// POST /api/cancel
pub async fn cancel_flow(State(state): State<AppState>) -> Json<ActionResponse> {
    Json(match state.flows.cancel() {
        Some(kind) => ActionResponse::ok(format!("Cancelling {}", kind)),
        None => ActionResponse {
            success: false,
            message: "No flow in progress".to_string(),
            flow_id: None,
        },
    })
}

fn coerce_bool(field: &str, value: &Value) -> ApiResult<bool> {
    let coerced = match value {
        Value::Bool(b) => Some(*b),
        Value::Null => Some(false),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };
    coerced.ok_or_else(|| ApiError::BadRequest(format!("{} must be a boolean", field)))
}

pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/init", post(init_device))
        .route("/api/config", post(update_config))
        .route("/api/cancel", post(cancel_flow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bool_coercion() {
        assert!(coerce_bool("f", &json!(true)).unwrap());
        assert!(coerce_bool("f", &json!(1)).unwrap());
        assert!(coerce_bool("f", &json!("On")).unwrap());
        assert!(!coerce_bool("f", &json!("false")).unwrap());
        assert!(!coerce_bool("f", &json!(null)).unwrap());
        assert!(coerce_bool("f", &json!("maybe")).is_err());
        assert!(coerce_bool("f", &json!([1])).is_err());
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(coerce_int("q", &json!(50)).unwrap(), 50);
        assert_eq!(coerce_int("q", &json!("35")).unwrap(), 35);
        assert_eq!(coerce_int("q", &json!(42.9)).unwrap(), 42);
        assert!(coerce_int("q", &json!("high")).is_err());
        assert!(coerce_int("q", &json!({})).is_err());
    }
}
