//! Timed acquisition loop
//!
//! Polls the scanner until the quality threshold has been exceeded for the
//! settle delay, the capture timeout expires, or the flow is cancelled. The
//! best frame seen during the run is retained; the frame that crossed the
//! threshold is not necessarily the one kept.
//!
//! All waits use `tokio::time`, so tests drive the loop with paused time.

use crate::capability::{FrameSize, Scanner};
use crate::error::FlowError;
use crate::models::{CaptureRequest, CapturedFrame, SegmentedCapture};
use crate::services::preview;
use crate::services::segmentation::SegmentationPipeline;
use chrono::Utc;
use livescan_common::events::{AgentEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a capture run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// Threshold exceeded and the settle delay elapsed
    Settled,
    TimedOut,
    Cancelled,
}

/// First frame whose quality exceeded the threshold
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCrossing {
    /// 0-based index among acquired frames
    pub frame_index: usize,
    pub quality: i32,
    pub at: Instant,
}

/// Everything one capture run observed
#[derive(Debug)]
pub struct CaptureRun {
    pub best: Option<CapturedFrame>,
    pub crossing: Option<ThresholdCrossing>,
    pub frames_acquired: usize,
    pub end: LoopEnd,
}

impl CaptureRun {
    pub fn best_quality(&self) -> i32 {
        self.best.as_ref().map(|frame| frame.quality).unwrap_or(0)
    }

    /// The retained frame, or [`FlowError::CaptureTimeout`] when none was
    pub fn into_frame(self) -> Result<CapturedFrame, FlowError> {
        self.best.ok_or(FlowError::CaptureTimeout)
    }
}

/// Acquisition loop bound to one scanner
#[derive(Clone)]
pub struct CaptureLoop {
    scanner: Arc<dyn Scanner>,
    events: EventBus,
    /// Set while a preview encode runs on the blocking pool
    preview_busy: Arc<AtomicBool>,
}

impl CaptureLoop {
    pub fn new(scanner: Arc<dyn Scanner>, events: EventBus) -> Self {
        Self {
            scanner,
            events,
            preview_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(&self, request: &CaptureRequest, cancel: &CancellationToken) -> CaptureRun {
        let threshold = request.settings.quality_threshold;
        let timing = request.timing;
        let size = self.scanner.frame_size();
        // A timeout beyond what `Instant` can represent never expires
        let deadline = Instant::now().checked_add(request.settings.capture_timeout());

        info!(
            kind = %request.kind,
            threshold,
            timeout_secs = request.settings.capture_timeout_secs,
            "Capture loop started"
        );

        let mut best: Option<CapturedFrame> = None;
        let mut crossing: Option<ThresholdCrossing> = None;
        let mut frames_acquired = 0usize;

        let end = loop {
            if cancel.is_cancelled() {
                break LoopEnd::Cancelled;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break LoopEnd::TimedOut;
            }

            if let Some(pixels) = self.scanner.acquire_frame() {
                let frame_index = frames_acquired;
                frames_acquired += 1;

                let quality = self.scanner.frame_quality(&pixels, size);
                self.publish_preview(&pixels, size, quality);

                if crossing.is_none() && quality > threshold {
                    debug!(frame_index, quality, "Quality threshold exceeded, settling");
                    crossing = Some(ThresholdCrossing {
                        frame_index,
                        quality,
                        at: Instant::now(),
                    });
                }

                let best_quality = best.as_ref().map(|f| f.quality).unwrap_or(0);
                if quality > best_quality {
                    best = Some(CapturedFrame {
                        pixels,
                        size,
                        quality,
                        captured_at: Utc::now(),
                    });
                }
            }

            if let Some(crossed) = crossing {
                if crossed.at.elapsed() >= timing.settle_delay {
                    break LoopEnd::Settled;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break LoopEnd::Cancelled,
                _ = sleep(timing.poll_interval) => {}
            }
        };

        let run = CaptureRun {
            best,
            crossing,
            frames_acquired,
            end,
        };
        info!(
            kind = %request.kind,
            end = ?run.end,
            frames = run.frames_acquired,
            best_quality = run.best_quality(),
            "Capture loop finished"
        );
        run
    }

    /// Run the loop, then segment the retained frame
    ///
    /// A run cancelled before any usable frame fails with
    /// [`FlowError::Cancelled`]; a cancelled run that did retain a frame is
    /// processed normally.
    pub async fn capture_segmented(
        &self,
        segmentation: &SegmentationPipeline,
        request: &CaptureRequest,
        cancel: &CancellationToken,
    ) -> Result<SegmentedCapture, FlowError> {
        let run = self.run(request, cancel).await;
        if run.end == LoopEnd::Cancelled && run.best.is_none() {
            return Err(FlowError::Cancelled);
        }
        let frame = run.into_frame()?;
        segmentation.process(frame, request.kind, request.mode)
    }

    /// Encode a preview off the async workers
    ///
    /// Frames acquired while the previous encode is still running get no
    /// preview.
    fn publish_preview(&self, pixels: &[u8], size: FrameSize, quality: i32) {
        if self.events.subscriber_count() == 0 {
            return;
        }
        if self.preview_busy.swap(true, Ordering::AcqRel) {
            debug!(quality, "Preview encode in progress, frame skipped");
            return;
        }

        let pixels = pixels.to_vec();
        let events = self.events.clone();
        let busy = Arc::clone(&self.preview_busy);
        tokio::task::spawn_blocking(move || {
            match preview::render_data_url(&pixels, size) {
                Ok(image_data) => events.emit_lossy(AgentEvent::LivePreview {
                    image_data,
                    quality,
                }),
                Err(e) => warn!(error = %e, "Live preview skipped"),
            }
            busy.store(false, Ordering::Release);
        });
    }
}
