//! # LiveScan Common Library
//!
//! Shared code for the LiveScan fingerprint agent and its tooling:
//! - Error type
//! - Event types (AgentEvent enum) and the EventBus
//! - TOML bootstrap configuration loading
//! - SSE streaming helper

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{AgentEvent, EventBus};
