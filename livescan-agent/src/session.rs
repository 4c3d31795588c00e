//! Capture session state
//!
//! One [`Session`] per agent, shared through `Arc`. It owns the device
//! status, the runtime capture settings, the two manual verification slots,
//! the enrollment record and the active-flow slot. At most one flow holds
//! the slot at a time; [`Session::try_begin`] hands out a [`FlowGuard`] that
//! releases it when dropped, so a flow that fails or panics still frees the
//! session.

use crate::error::FlowError;
use crate::models::{
    CaptureSettings, EnrollmentRecord, EnrollmentState, SegmentedCapture, TemplateSlot,
};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Kind of flow holding the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    ManualCapture,
    Enrollment,
    Identification,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::ManualCapture => "manual_capture",
            FlowKind::Enrollment => "enrollment",
            FlowKind::Identification => "identification",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ActiveFlow {
    id: Uuid,
    kind: FlowKind,
    cancel: CancellationToken,
}

/// Shared capture session
pub struct Session {
    initialized: AtomicBool,
    settings: RwLock<CaptureSettings>,
    active: Mutex<Option<ActiveFlow>>,
    slots: Mutex<[Option<Vec<u8>>; 2]>,
    enrollment: Mutex<EnrollmentRecord>,
    enrollment_state: Mutex<EnrollmentState>,
}

/// Lock a std mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            settings: RwLock::new(settings),
            active: Mutex::new(None),
            slots: Mutex::new([None, None]),
            enrollment: Mutex::new(EnrollmentRecord::new()),
            enrollment_state: Mutex::new(EnrollmentState::Idle),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    /// Snapshot of the current capture settings
    pub fn settings(&self) -> CaptureSettings {
        *self
            .settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a settings change; running flows keep their snapshot
    pub fn update_settings(&self, update: impl FnOnce(&mut CaptureSettings)) -> CaptureSettings {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut settings);
        *settings
    }

    /// Claim the active-flow slot
    ///
    /// Fails with [`FlowError::Busy`] while another flow holds it; the
    /// session is left untouched in that case.
    pub fn try_begin(self: &Arc<Self>, kind: FlowKind) -> Result<FlowGuard, FlowError> {
        let mut active = lock(&self.active);
        if let Some(current) = active.as_ref() {
            debug!(requested = %kind, active = %current.kind, "Flow rejected, session busy");
            return Err(FlowError::Busy(current.kind.to_string()));
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *active = Some(ActiveFlow {
            id,
            kind,
            cancel: cancel.clone(),
        });
        debug!(flow_id = %id, kind = %kind, "Flow started");

        Ok(FlowGuard {
            session: Arc::clone(self),
            id,
            kind,
            cancel,
        })
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn active_flow(&self) -> Option<FlowKind> {
        lock(&self.active).as_ref().map(|flow| flow.kind)
    }

    /// Request cooperative cancellation of the active flow
    ///
    /// Returns the kind of the flow that was signalled.
    pub fn cancel_active(&self) -> Option<FlowKind> {
        let active = lock(&self.active);
        let flow = active.as_ref()?;
        info!(flow_id = %flow.id, kind = %flow.kind, "Cancelling active flow");
        flow.cancel.cancel();
        Some(flow.kind)
    }

    fn release(&self, id: Uuid) {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|flow| flow.id == id) {
            *active = None;
            debug!(flow_id = %id, "Flow released");
        }
    }

    pub fn store_slot(&self, slot: TemplateSlot, template: Vec<u8>) {
        lock(&self.slots)[slot.index()] = Some(template);
    }

    pub fn slot(&self, slot: TemplateSlot) -> Option<Vec<u8>> {
        lock(&self.slots)[slot.index()].clone()
    }

    /// Occupancy of slots 1 and 2
    pub fn slot_occupancy(&self) -> [bool; 2] {
        let slots = lock(&self.slots);
        [slots[0].is_some(), slots[1].is_some()]
    }

    pub fn reset_enrollment(&self) {
        lock(&self.enrollment).clear();
    }

    pub fn absorb_enrollment(&self, capture: SegmentedCapture) {
        lock(&self.enrollment).absorb(capture);
    }

    /// (templates, images) currently held
    pub fn enrollment_counts(&self) -> (usize, usize) {
        let record = lock(&self.enrollment);
        (record.template_count(), record.image_count())
    }

    /// Hand out the completed record and clear it
    pub fn take_enrollment(&self) -> Result<EnrollmentRecord, FlowError> {
        let mut record = lock(&self.enrollment);
        if !record.is_complete() {
            return Err(FlowError::IncompleteData {
                templates: record.template_count(),
                images: record.image_count(),
            });
        }
        Ok(std::mem::take(&mut *record))
    }

    pub fn enrollment_state(&self) -> EnrollmentState {
        *lock(&self.enrollment_state)
    }

    /// Move the enrollment state machine; invalid transitions are refused
    pub fn transition_enrollment(&self, to: EnrollmentState) -> bool {
        let mut state = lock(&self.enrollment_state);
        if !state.can_transition_to(to) {
            warn!(from = ?*state, to = ?to, "Invalid enrollment transition");
            return false;
        }
        debug!(from = ?*state, to = ?to, "Enrollment state transition");
        *state = to;
        true
    }

    pub fn status(&self) -> SessionStatus {
        let initialized = self.is_initialized();
        let [template1, template2] = self.slot_occupancy();
        let (templates, images) = self.enrollment_counts();
        SessionStatus {
            initialized,
            status: if initialized { "ready" } else { "not initialized" },
            templates: SlotStatus {
                template1,
                template2,
            },
            busy: self.is_busy(),
            active_flow: self.active_flow(),
            enrollment_state: self.enrollment_state(),
            enrollment_templates: templates,
            enrollment_images: images,
            settings: self.settings(),
        }
    }
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub initialized: bool,
    pub status: &'static str,
    pub templates: SlotStatus,
    pub busy: bool,
    pub active_flow: Option<FlowKind>,
    pub enrollment_state: EnrollmentState,
    pub enrollment_templates: usize,
    pub enrollment_images: usize,
    pub settings: CaptureSettings,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlotStatus {
    pub template1: bool,
    pub template2: bool,
}

/// Proof of holding the active-flow slot; dropping it releases the slot
pub struct FlowGuard {
    session: Arc<Session>,
    id: Uuid,
    kind: FlowKind,
    cancel: CancellationToken,
}

impl FlowGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        self.session.release(self.id);
    }
}
