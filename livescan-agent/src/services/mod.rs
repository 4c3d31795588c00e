//! Capture pipeline services
//!
//! - capture_loop: timed acquisition with quality settling
//! - segmentation: slap splitting, templating and labeling
//! - enrollment: three-phase enrollment sequencer
//! - identification: 1:N first-match search
//! - template_repository: remote bulk template read
//! - preview / notifications: live preview rendering and event publishing

pub mod capture_loop;
pub mod enrollment;
pub mod identification;
pub mod notifications;
pub mod preview;
pub mod segmentation;
pub mod template_repository;

pub use capture_loop::{CaptureLoop, CaptureRun, LoopEnd, ThresholdCrossing};
pub use enrollment::EnrollmentOrchestrator;
pub use identification::IdentificationMatcher;
pub use notifications::Notifier;
pub use segmentation::SegmentationPipeline;
pub use template_repository::{
    EnrolledIdentity, HttpTemplateRepository, RepositoryError, TemplateRepository,
};
