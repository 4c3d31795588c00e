//! Data models for the capture agent

pub mod capture;
pub mod enrollment;
pub mod matching;

pub use capture::{
    CaptureKind, CaptureMode, CaptureRequest, CaptureSettings, CaptureTiming, CapturedFrame,
    FingerPosition, FingerSegment, PositionLabel, SegmentedCapture, TemplateSlot,
};
pub use enrollment::{EnrollmentPayload, EnrollmentRecord, EnrollmentState, ImageKey};
pub use matching::{IdentificationOutcome, Identity, MatchResult};
