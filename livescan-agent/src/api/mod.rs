//! HTTP API handlers for livescan-agent
//!
//! Flow-level failures (busy, not initialized, bad slot) are answered with
//! `200 {success: false, message}`; only malformed requests and missing
//! resources use error status codes.

pub mod capture;
pub mod device;
pub mod enrollment;
pub mod health;
pub mod identification;
pub mod sse;

pub use capture::capture_routes;
pub use device::device_routes;
pub use enrollment::enrollment_routes;
pub use health::health_routes;
pub use identification::identification_routes;
pub use sse::event_stream;

use crate::error::{ApiError, FlowError};
use crate::flows::FlowStarted;
use axum::{extract::rejection::JsonRejection, Json};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// `{success, message}` body shared by action endpoints
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<Uuid>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            flow_id: None,
        }
    }

    pub fn rejected(err: &FlowError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            flow_id: None,
        }
    }

    /// Acknowledge a started flow; the task keeps running detached
    pub fn started(started: FlowStarted, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            flow_id: Some(started.flow_id),
        }
    }

    pub fn from_start(result: Result<FlowStarted, FlowError>, message: &str) -> Self {
        match result {
            Ok(started) => Self::started(started, message),
            Err(e) => {
                tracing::info!(error = %e, "Flow start rejected");
                Self::rejected(&e)
            }
        }
    }
}

/// Integer from a JSON number or numeric string
pub(crate) fn coerce_int(field: &str, value: &Value) -> Result<i64, ApiError> {
    let coerced = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    coerced.ok_or_else(|| ApiError::BadRequest(format!("{} must be an integer", field)))
}

/// JSON object body, or 400 when the body is missing or malformed
pub(crate) fn object_body(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(_) => Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}
