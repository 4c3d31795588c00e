//! Enrollment record and enrollment state machine
//!
//! Idle → LeftHandCapture → PauseBeforeRightHand → RightHandCapture →
//! PauseBeforeThumbs → ThumbsCapture → Finished, with Failed reachable from
//! every capture and pause state.

use super::capture::{CaptureKind, FingerPosition, PositionLabel, SegmentedCapture};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Finger templates in a complete record (4 + 4 + 2)
pub const REQUIRED_TEMPLATES: usize = 10;

/// Images in a complete record (10 fingers + 3 slaps)
pub const REQUIRED_IMAGES: usize = 13;

/// Key of one stored enrollment image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageKey {
    /// Composite image of one capture phase
    Slap(CaptureKind),
    /// Single finger cut from a slap
    Finger(FingerPosition),
}

impl ImageKey {
    /// Wire key (`img_slap_left_four`, `img_left_index`)
    pub fn key(&self) -> String {
        match self {
            ImageKey::Slap(kind) => format!("img_slap_{}", kind),
            ImageKey::Finger(position) => format!("img_{}", position),
        }
    }
}

/// Wire key of one finger template (`fmr_left_index`)
pub fn template_key(position: FingerPosition) -> String {
    format!("fmr_{}", position)
}

/// Templates and images accumulated across the three enrollment phases
#[derive(Debug, Clone, Default)]
pub struct EnrollmentRecord {
    templates: BTreeMap<FingerPosition, Vec<u8>>,
    images: BTreeMap<ImageKey, Vec<u8>>,
}

impl EnrollmentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the slap image and every segment of one enrollment phase
    pub fn absorb(&mut self, capture: SegmentedCapture) {
        self.images.insert(ImageKey::Slap(capture.kind), capture.composite);

        for segment in capture.segments {
            match segment.position {
                PositionLabel::Finger(position) => {
                    self.images.insert(ImageKey::Finger(position), segment.image);
                    self.templates.insert(position, segment.template);
                }
                PositionLabel::Probe(n) => {
                    warn!(probe = n, "Probe segment ignored by enrollment record");
                }
            }
        }
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn template(&self, position: FingerPosition) -> Option<&[u8]> {
        self.templates.get(&position).map(Vec::as_slice)
    }

    pub fn image(&self, key: ImageKey) -> Option<&[u8]> {
        self.images.get(&key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.images.is_empty()
    }

    /// Exactly 10 templates and 13 images
    pub fn is_complete(&self) -> bool {
        self.template_count() == REQUIRED_TEMPLATES && self.image_count() == REQUIRED_IMAGES
    }

    pub fn clear(&mut self) {
        self.templates.clear();
        self.images.clear();
    }

    /// Base64 rendering for the retrieval endpoint
    pub fn to_payload(&self) -> EnrollmentPayload {
        let encode = |bytes: &Vec<u8>| general_purpose::STANDARD.encode(bytes);
        EnrollmentPayload {
            templates_base64: self
                .templates
                .iter()
                .map(|(position, bytes)| (template_key(*position), encode(bytes)))
                .collect(),
            images_base64: self
                .images
                .iter()
                .map(|(key, bytes)| (key.key(), encode(bytes)))
                .collect(),
        }
    }
}

/// Base64-encoded enrollment data
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentPayload {
    pub templates_base64: BTreeMap<String, String>,
    pub images_base64: BTreeMap<String, String>,
}

/// Enrollment sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Idle,
    LeftHandCapture,
    PauseBeforeRightHand,
    RightHandCapture,
    PauseBeforeThumbs,
    ThumbsCapture,
    Finished,
    Failed,
}

impl EnrollmentState {
    /// Next state on the success path
    pub fn next(&self) -> Option<Self> {
        match self {
            EnrollmentState::Idle => Some(EnrollmentState::LeftHandCapture),
            EnrollmentState::LeftHandCapture => Some(EnrollmentState::PauseBeforeRightHand),
            EnrollmentState::PauseBeforeRightHand => Some(EnrollmentState::RightHandCapture),
            EnrollmentState::RightHandCapture => Some(EnrollmentState::PauseBeforeThumbs),
            EnrollmentState::PauseBeforeThumbs => Some(EnrollmentState::ThumbsCapture),
            EnrollmentState::ThumbsCapture => Some(EnrollmentState::Finished),
            EnrollmentState::Finished | EnrollmentState::Failed => None,
        }
    }

    /// A sequence is running (not Idle, Finished or Failed)
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            EnrollmentState::Idle | EnrollmentState::Finished | EnrollmentState::Failed
        )
    }

    pub fn can_transition_to(&self, to: EnrollmentState) -> bool {
        match to {
            // A new sequence may start from any resting state
            EnrollmentState::LeftHandCapture if !self.is_active() => true,
            EnrollmentState::Failed => self.is_active(),
            _ => self.next() == Some(to),
        }
    }
}
