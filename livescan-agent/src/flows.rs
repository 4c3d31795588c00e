//! Flow entry points
//!
//! Every capture-driven operation follows the same shape: validate the
//! request, claim the session with a [`FlowGuard`], spawn the work as a
//! background task and acknowledge immediately. Results arrive as events.
//! A rejected start (not initialized, busy, bad arguments) leaves the
//! session untouched.

use crate::capability::Scanner;
use crate::error::FlowError;
use crate::models::capture::UnknownCaptureKind;
use crate::models::{
    CaptureKind, CaptureMode, CaptureRequest, CaptureSettings, CaptureTiming, EnrollmentRecord,
    IdentificationOutcome, MatchResult, TemplateSlot,
};
use crate::services::{
    CaptureLoop, EnrollmentOrchestrator, IdentificationMatcher, Notifier, SegmentationPipeline,
    TemplateRepository,
};
use crate::session::{FlowGuard, FlowKind, Session};
use livescan_common::events::EventBus;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Thresholds and timing fixed at startup
#[derive(Debug, Clone, Copy)]
pub struct FlowConfig {
    pub timing: CaptureTiming,
    /// 1:1 verification matches at `score >= verification_threshold`
    pub verification_threshold: i32,
    /// 1:N identification matches at `score > identification_threshold`
    pub identification_threshold: i32,
}

/// Partial capture settings change
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsUpdate {
    pub quality_threshold: Option<i32>,
    pub capture_timeout_secs: Option<u64>,
    pub fog_removal: Option<bool>,
}

/// Acknowledgement of a flow that is now running in the background
#[derive(Debug)]
pub struct FlowStarted {
    pub flow_id: Uuid,
    pub kind: FlowKind,
    /// Completes when the flow has released the session
    pub task: JoinHandle<()>,
}

/// Everything a flow needs, cheap to clone into a task
#[derive(Clone)]
pub struct FlowContext {
    session: Arc<Session>,
    scanner: Arc<dyn Scanner>,
    events: EventBus,
    capture: CaptureLoop,
    segmentation: SegmentationPipeline,
    matcher: IdentificationMatcher,
    config: FlowConfig,
}

impl FlowContext {
    pub fn new(
        session: Arc<Session>,
        scanner: Arc<dyn Scanner>,
        repository: Arc<dyn TemplateRepository>,
        events: EventBus,
        config: FlowConfig,
    ) -> Self {
        Self {
            capture: CaptureLoop::new(scanner.clone(), events.clone()),
            segmentation: SegmentationPipeline::new(scanner.clone()),
            matcher: IdentificationMatcher::new(
                scanner.clone(),
                repository,
                config.identification_threshold,
            ),
            session,
            scanner,
            events,
            config,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Open the device and algorithms; repeating it after success is harmless
    pub fn initialize(&self) -> Result<(), FlowError> {
        match self.scanner.open() {
            Ok(()) => {
                self.session.set_initialized(true);
                info!("Scanner initialized");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Scanner initialization failed");
                self.session.set_initialized(false);
                Err(FlowError::DeviceInit(e))
            }
        }
    }

    pub fn configure(&self, update: SettingsUpdate) -> CaptureSettings {
        let settings = self.session.update_settings(|settings| {
            if let Some(threshold) = update.quality_threshold {
                settings.quality_threshold = threshold;
            }
            if let Some(timeout) = update.capture_timeout_secs {
                settings.capture_timeout_secs = timeout;
            }
            if let Some(fog_removal) = update.fog_removal {
                settings.fog_removal = fog_removal;
            }
        });
        info!(
            quality_threshold = settings.quality_threshold,
            capture_timeout_secs = settings.capture_timeout_secs,
            fog_removal = settings.fog_removal,
            "Capture settings updated"
        );
        settings
    }

    /// Capture one hand (or the thumbs) into verification slot `template_no`
    pub fn start_manual_capture(
        &self,
        template_no: i64,
        capture_type: &str,
    ) -> Result<FlowStarted, FlowError> {
        self.ensure_initialized()?;
        let kind: CaptureKind = capture_type
            .parse()
            .map_err(|UnknownCaptureKind(name)| FlowError::UnsupportedKind(name))?;
        if kind.is_identification() {
            return Err(FlowError::UnsupportedKind(kind.to_string()));
        }
        let slot =
            TemplateSlot::from_number(template_no).ok_or(FlowError::InvalidSlot(template_no))?;

        let guard = self.session.try_begin(FlowKind::ManualCapture)?;
        let request = self.request(kind, CaptureMode::Manual(slot));
        info!(flow_id = %guard.id(), kind = %kind, slot = slot.number(), "Manual capture started");

        let ctx = self.clone();
        Ok(self.spawn(guard, move |guard| ctx.run_manual_capture(guard, request, slot)))
    }

    /// Start the three-phase enrollment; any previous record is discarded
    pub fn start_enrollment(&self) -> Result<FlowStarted, FlowError> {
        self.ensure_initialized()?;
        let guard = self.session.try_begin(FlowKind::Enrollment)?;
        self.session.reset_enrollment();
        let settings = self.session.settings();
        info!(flow_id = %guard.id(), "Enrollment started");

        let ctx = self.clone();
        Ok(self.spawn(guard, move |guard| ctx.run_enrollment(guard, settings)))
    }

    /// Capture probe fingers and search the remote repository
    pub fn start_identification(&self) -> Result<FlowStarted, FlowError> {
        self.ensure_initialized()?;
        let guard = self.session.try_begin(FlowKind::Identification)?;
        let request = self.request(CaptureKind::IdentifyAny, CaptureMode::Identification);
        info!(flow_id = %guard.id(), "Identification started");

        Notifier::new(self.events.clone(), guard.id())
            .identification_step("Place any finger on the scanner");

        let ctx = self.clone();
        Ok(self.spawn(guard, move |guard| ctx.run_identification(guard, request)))
    }

    /// Compare slot 1 against slot 2
    pub fn verify_slots(&self) -> Result<MatchResult, FlowError> {
        let (Some(first), Some(second)) = (
            self.session.slot(TemplateSlot::First),
            self.session.slot(TemplateSlot::Second),
        ) else {
            return Err(FlowError::MissingTemplates);
        };
        self.ensure_initialized()?;

        let score = self.scanner.compare_templates(&first, &second);
        let result = MatchResult::verification(score, self.config.verification_threshold);
        info!(score, matched = result.matched, "Manual verification");
        Ok(result)
    }

    /// Signal the active flow to stop at its next suspension point
    pub fn cancel(&self) -> Option<FlowKind> {
        self.session.cancel_active()
    }

    pub fn take_enrollment(&self) -> Result<EnrollmentRecord, FlowError> {
        let record = self.session.take_enrollment()?;
        info!(
            templates = record.template_count(),
            images = record.image_count(),
            "Enrollment data handed out"
        );
        Ok(record)
    }

    fn ensure_initialized(&self) -> Result<(), FlowError> {
        if self.session.is_initialized() {
            Ok(())
        } else {
            Err(FlowError::NotInitialized)
        }
    }

    fn request(&self, kind: CaptureKind, mode: CaptureMode) -> CaptureRequest {
        CaptureRequest {
            kind,
            mode,
            settings: self.session.settings(),
            timing: self.config.timing,
        }
    }

    fn spawn<F, Fut>(&self, guard: FlowGuard, flow: F) -> FlowStarted
    where
        F: FnOnce(FlowGuard) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let flow_id = guard.id();
        let kind = guard.kind();
        let task = tokio::spawn(flow(guard));
        FlowStarted {
            flow_id,
            kind,
            task,
        }
    }

    async fn run_manual_capture(
        self,
        guard: FlowGuard,
        request: CaptureRequest,
        slot: TemplateSlot,
    ) {
        let notifier = Notifier::new(self.events.clone(), guard.id());
        let cancel = guard.cancel_token();

        match self
            .capture
            .capture_segmented(&self.segmentation, &request, &cancel)
            .await
        {
            Ok(capture) => {
                let fingers = capture.segments.len();
                self.session.store_slot(slot, capture.combined_template());
                info!(slot = slot.number(), fingers, "Template stored");
                notifier.capture_result(
                    true,
                    format!("Captured {} ({} fingers)", request.kind, fingers),
                    Some(request.kind),
                    Some(slot),
                );
            }
            Err(e) => {
                warn!(kind = %request.kind, error = %e, "Manual capture failed");
                notifier.capture_result(false, e.to_string(), Some(request.kind), Some(slot));
            }
        }
        drop(guard);
    }

    async fn run_enrollment(self, guard: FlowGuard, settings: CaptureSettings) {
        let notifier = Notifier::new(self.events.clone(), guard.id());
        let orchestrator = EnrollmentOrchestrator::new(
            self.session.clone(),
            self.capture.clone(),
            self.segmentation.clone(),
            notifier,
        );

        // Outcome is already reported through events
        let _ = orchestrator
            .run(settings, self.config.timing, &guard.cancel_token())
            .await;
        drop(guard);
    }

    async fn run_identification(self, guard: FlowGuard, request: CaptureRequest) {
        let notifier = Notifier::new(self.events.clone(), guard.id());
        let cancel = guard.cancel_token();

        let result = match self.identify(&notifier, &request, &cancel).await {
            Ok(outcome) => MatchResult::from(outcome),
            Err(e) => MatchResult::failure(e.to_string()),
        };

        notifier.identification_result(&result);
        drop(guard);
    }

    async fn identify(
        &self,
        notifier: &Notifier,
        request: &CaptureRequest,
        cancel: &CancellationToken,
    ) -> Result<IdentificationOutcome, FlowError> {
        let capture = match self
            .capture
            .capture_segmented(&self.segmentation, request, cancel)
            .await
        {
            Ok(capture) => capture,
            Err(e) => {
                warn!(error = %e, "Identification capture failed");
                notifier.capture_result(false, e.to_string(), Some(request.kind), None);
                return Err(e);
            }
        };

        notifier.identification_step(format!(
            "Comparing {} probe templates",
            capture.segments.len()
        ));
        self.matcher.identify(&capture.templates()).await
    }
}
