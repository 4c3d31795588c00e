//! Typed helpers for publishing flow notifications

use crate::models::{CaptureKind, MatchResult, TemplateSlot};
use chrono::Utc;
use livescan_common::events::{AgentEvent, EnrollmentStepId, EventBus};
use uuid::Uuid;

/// Publishes the notifications of one flow
#[derive(Clone)]
pub struct Notifier {
    events: EventBus,
    flow_id: Uuid,
}

impl Notifier {
    pub fn new(events: EventBus, flow_id: Uuid) -> Self {
        Self { events, flow_id }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn capture_result(
        &self,
        success: bool,
        message: impl Into<String>,
        kind: Option<CaptureKind>,
        slot: Option<TemplateSlot>,
    ) {
        self.events.emit_lossy(AgentEvent::CaptureResult {
            flow_id: self.flow_id,
            success,
            message: message.into(),
            template_no: slot.map(|s| s.number()),
            capture_type: kind.map(|k| k.to_string()),
            timestamp: Utc::now(),
        });
    }

    pub fn enrollment_step(&self, step: EnrollmentStepId, message: impl Into<String>) {
        self.events.emit_lossy(AgentEvent::EnrollmentStep {
            flow_id: self.flow_id,
            step,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn identification_step(&self, message: impl Into<String>) {
        self.events.emit_lossy(AgentEvent::IdentificationStep {
            flow_id: self.flow_id,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn identification_result(&self, result: &MatchResult) {
        let identity = result.identity.as_ref();
        self.events.emit_lossy(AgentEvent::IdentificationResult {
            flow_id: self.flow_id,
            success: result.success,
            found: result.matched,
            name: identity.map(|i| i.name.clone()),
            id_number: identity.map(|i| i.id_number.clone()),
            score: result.score,
            message: result.message.clone(),
            timestamp: Utc::now(),
        });
    }
}
