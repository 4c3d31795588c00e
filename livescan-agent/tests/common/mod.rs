//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use livescan_agent::capability::simulated::SimulatedScanner;
use livescan_agent::capability::TEMPLATE_SIZE;
use livescan_agent::flows::{FlowConfig, FlowContext};
use livescan_agent::models::{CaptureSettings, CaptureTiming};
use livescan_agent::services::{EnrolledIdentity, RepositoryError, TemplateRepository};
use livescan_agent::session::Session;
use livescan_common::events::{AgentEvent, EventBus};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Repository returning a fixed list (or a fixed network error)
pub struct FixedRepository(pub Result<Vec<EnrolledIdentity>, String>);

#[async_trait]
impl TemplateRepository for FixedRepository {
    async fn fetch_all(&self) -> Result<Vec<EnrolledIdentity>, RepositoryError> {
        self.0.clone().map_err(RepositoryError::Network)
    }
}

pub fn empty_repository() -> Arc<dyn TemplateRepository> {
    Arc::new(FixedRepository(Ok(Vec::new())))
}

/// Template exactly as the simulated scanner creates it for segment `marker`
pub fn simulated_template(marker: u8) -> Vec<u8> {
    let mut template = vec![0x46; TEMPLATE_SIZE];
    template[0] = marker;
    template
}

pub fn settings() -> CaptureSettings {
    CaptureSettings {
        quality_threshold: 40,
        capture_timeout_secs: 15,
        fog_removal: false,
    }
}

pub fn flow_config() -> FlowConfig {
    FlowConfig {
        timing: CaptureTiming::default(),
        verification_threshold: 45,
        identification_threshold: 55,
    }
}

/// Flow context over a simulated scanner, not yet initialized
pub fn context(
    scanner: SimulatedScanner,
    repository: Arc<dyn TemplateRepository>,
) -> (FlowContext, Arc<SimulatedScanner>) {
    let scanner = Arc::new(scanner);
    let session = Arc::new(Session::new(settings()));
    let ctx = FlowContext::new(
        session,
        scanner.clone(),
        repository,
        EventBus::new(1024),
        flow_config(),
    );
    (ctx, scanner)
}

/// Flow context with the device already initialized
pub fn ready_context(
    scanner: SimulatedScanner,
    repository: Arc<dyn TemplateRepository>,
) -> (FlowContext, Arc<SimulatedScanner>) {
    let (ctx, scanner) = context(scanner, repository);
    ctx.initialize().unwrap();
    assert!(scanner.is_open());
    (ctx, scanner)
}

/// Everything currently buffered, previews excluded
pub fn drain(rx: &mut broadcast::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if !matches!(event, AgentEvent::LivePreview { .. }) {
            events.push(event);
        }
    }
    events
}
