//! livescan-agent library interface
//!
//! The binary in `main.rs` only wires configuration, logging and the
//! listener around [`build_router`]; integration tests drive the same router.

pub mod api;
pub mod capability;
pub mod config;
pub mod error;
pub mod flows;
pub mod models;
pub mod services;
pub mod session;

pub use crate::error::{ApiError, ApiResult, FlowError};

use axum::Router;
use chrono::{DateTime, Utc};
use flows::FlowContext;
use livescan_common::events::EventBus;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub flows: FlowContext,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(flows: FlowContext) -> Self {
        Self {
            event_bus: flows.events().clone(),
            flows,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// The agent serves browser front ends on other origins, so CORS is open.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::device_routes())
        .merge(api::capture_routes())
        .merge(api::enrollment_routes())
        .merge(api::identification_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
