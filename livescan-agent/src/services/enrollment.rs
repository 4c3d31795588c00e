//! Three-phase enrollment sequencer
//!
//! Left four fingers, right four fingers, then both thumbs, with a pause
//! before each hand change so the operator can reposition. Every phase is a
//! full capture loop plus segmentation in enrollment mode; its result is
//! merged into the session's enrollment record. A failing phase stops the
//! sequence; phases already merged stay in the record.

use crate::error::FlowError;
use crate::models::{
    CaptureKind, CaptureMode, CaptureRequest, CaptureSettings, CaptureTiming, EnrollmentState,
};
use crate::services::capture_loop::CaptureLoop;
use crate::services::notifications::Notifier;
use crate::services::segmentation::SegmentationPipeline;
use crate::session::Session;
use livescan_common::events::EnrollmentStepId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Phase {
    /// Pause state entered before this phase, with the announcement sent on entry
    pause: Option<(EnrollmentState, &'static str)>,
    capture_state: EnrollmentState,
    kind: CaptureKind,
    step: EnrollmentStepId,
    prompt: &'static str,
}

const PHASES: [Phase; 3] = [
    Phase {
        pause: None,
        capture_state: EnrollmentState::LeftHandCapture,
        kind: CaptureKind::LeftFour,
        step: EnrollmentStepId::LeftHand,
        prompt: "Place your four left fingers on the scanner",
    },
    Phase {
        pause: Some((
            EnrollmentState::PauseBeforeRightHand,
            "Left hand captured. Get ready for the right hand",
        )),
        capture_state: EnrollmentState::RightHandCapture,
        kind: CaptureKind::RightFour,
        step: EnrollmentStepId::RightHand,
        prompt: "Place your four right fingers on the scanner",
    },
    Phase {
        pause: Some((
            EnrollmentState::PauseBeforeThumbs,
            "Right hand captured. Get ready for the thumbs",
        )),
        capture_state: EnrollmentState::ThumbsCapture,
        kind: CaptureKind::TwoThumbs,
        step: EnrollmentStepId::Thumbs,
        prompt: "Place both thumbs on the scanner",
    },
];

/// Drives one enrollment sequence against the session
pub struct EnrollmentOrchestrator {
    session: Arc<Session>,
    capture: CaptureLoop,
    segmentation: SegmentationPipeline,
    notifier: Notifier,
}

impl EnrollmentOrchestrator {
    pub fn new(
        session: Arc<Session>,
        capture: CaptureLoop,
        segmentation: SegmentationPipeline,
        notifier: Notifier,
    ) -> Self {
        Self {
            session,
            capture,
            segmentation,
            notifier,
        }
    }

    /// Run all phases; failures are reported and leave the state machine in `Failed`
    pub async fn run(
        &self,
        settings: CaptureSettings,
        timing: CaptureTiming,
        cancel: &CancellationToken,
    ) -> Result<(), FlowError> {
        match self.run_phases(settings, timing, cancel).await {
            Ok(()) => {
                self.session.transition_enrollment(EnrollmentState::Finished);
                info!(flow_id = %self.notifier.flow_id(), "Enrollment finished");
                self.notifier
                    .enrollment_step(EnrollmentStepId::Finished, "All fingerprints captured");
                Ok(())
            }
            Err(e) => {
                warn!(flow_id = %self.notifier.flow_id(), error = %e, "Enrollment failed");
                self.session.transition_enrollment(EnrollmentState::Failed);
                self.notifier.capture_result(false, e.to_string(), None, None);
                self.notifier
                    .enrollment_step(EnrollmentStepId::Failed, format!("Enrollment failed: {}", e));
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        settings: CaptureSettings,
        timing: CaptureTiming,
        cancel: &CancellationToken,
    ) -> Result<(), FlowError> {
        for phase in &PHASES {
            if let Some((pause_state, announcement)) = phase.pause {
                self.session.transition_enrollment(pause_state);
                self.notifier.enrollment_step(phase.step, announcement);
                pause(timing.phase_pause, cancel).await?;
            }
            if cancel.is_cancelled() {
                return Err(FlowError::Cancelled);
            }

            self.session.transition_enrollment(phase.capture_state);
            self.notifier.enrollment_step(phase.step, phase.prompt);

            let request = CaptureRequest {
                kind: phase.kind,
                mode: CaptureMode::Enrollment,
                settings,
                timing,
            };
            let capture = self
                .capture
                .capture_segmented(&self.segmentation, &request, cancel)
                .await?;
            let fingers = capture.segments.len();
            self.session.absorb_enrollment(capture);

            info!(kind = %phase.kind, fingers, "Enrollment phase captured");
            self.notifier.capture_result(
                true,
                format!("Captured {} fingers ({})", fingers, phase.kind),
                Some(phase.kind),
                None,
            );
        }
        Ok(())
    }
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), FlowError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(FlowError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
