//! Event types for the LiveScan event system
//!
//! Every notification a capture flow produces is an [`AgentEvent`]. Events
//! are published on the [`EventBus`] and forwarded to SSE clients; delivery
//! is best-effort.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Enrollment step identifiers reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStepId {
    /// Four left-hand fingers
    LeftHand,
    /// Four right-hand fingers
    RightHand,
    /// Both thumbs
    Thumbs,
    /// All three phases captured
    Finished,
    /// Sequence aborted
    Failed,
}

/// LiveScan event types
///
/// Serialized with a `type` tag; the tag doubles as the SSE event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Downscaled preview of the frame just acquired
    LivePreview {
        /// `data:image/jpeg;base64,...` URL
        image_data: String,
        /// Quality score of the frame
        quality: i32,
    },

    /// Outcome of one capture (manual capture or one enrollment phase)
    CaptureResult {
        flow_id: Uuid,
        success: bool,
        message: String,
        /// Manual verification slot, when the capture targeted one
        #[serde(skip_serializing_if = "Option::is_none")]
        template_no: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        capture_type: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Enrollment sequence progress
    EnrollmentStep {
        flow_id: Uuid,
        step: EnrollmentStepId,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Identification progress (prompts)
    IdentificationStep {
        flow_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Final 1:N identification result
    IdentificationResult {
        flow_id: Uuid,
        success: bool,
        found: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id_number: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AgentEvent {
    /// SSE event name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::LivePreview { .. } => "live_preview",
            AgentEvent::CaptureResult { .. } => "capture_result",
            AgentEvent::EnrollmentStep { .. } => "enrollment_step",
            AgentEvent::IdentificationStep { .. } => "identification_step",
            AgentEvent::IdentificationResult { .. } => "identification_result",
        }
    }
}

/// Broadcast bus for [`AgentEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lag and lose the oldest events once `capacity`
    /// events are buffered.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: AgentEvent) -> Result<usize, broadcast::error::SendError<AgentEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AgentEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
