//! Error types for livescan-agent
//!
//! [`FlowError`] covers everything a capture, enrollment, identification or
//! verification flow can fail with; it never reaches HTTP as a status code
//! and is reported as `{success: false, message}` instead. [`ApiError`]
//! covers malformed requests and missing resources.

use crate::capability::CapabilityError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Flow-level failure
#[derive(Debug, Error)]
pub enum FlowError {
    /// Hardware or algorithm bring-up failed
    #[error("Device initialization failed: {0}")]
    DeviceInit(#[source] CapabilityError),

    /// Operation needs an initialized device
    #[error("Device not initialized")]
    NotInitialized,

    /// Another flow holds the session
    #[error("Device busy: {0} in progress")]
    Busy(String),

    /// Capture loop ended without retaining a frame
    #[error("No image captured")]
    CaptureTimeout,

    /// Segmenter rejected the frame
    #[error("Segmentation failed: {0}")]
    SegmentationFailed(#[source] CapabilityError),

    /// Wrong number of fingers detected
    #[error("Expected {expected} fingers, detected {detected}")]
    SegmentationMismatch { expected: usize, detected: usize },

    /// No segment produced a template
    #[error("No templates could be created")]
    NoTemplates,

    /// Template repository could not be read
    #[error("Template repository unavailable: {0}")]
    RemoteStoreUnavailable(String),

    /// Enrollment record is not complete
    #[error("Enrollment data incomplete: {templates} templates, {images} images")]
    IncompleteData { templates: usize, images: usize },

    /// A verification slot is empty
    #[error("Both template slots must be captured before matching")]
    MissingTemplates,

    /// Slot number other than 1 or 2
    #[error("Invalid template slot: {0}")]
    InvalidSlot(i64),

    /// Capture kind not allowed for this operation
    #[error("Unsupported capture type: {0}")]
    UnsupportedKind(String),

    /// Flow was cancelled
    #[error("Cancelled")]
    Cancelled,
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::IncompleteData { .. } => ApiError::NotFound(err.to_string()),
            FlowError::InvalidSlot(_) | FlowError::UnsupportedKind(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
