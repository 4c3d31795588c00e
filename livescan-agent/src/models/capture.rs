//! Capture kinds, finger positions and capture artifacts

use crate::capability::FrameSize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What the operator places on the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    /// Index to little finger of the left hand
    LeftFour,
    /// Index to little finger of the right hand
    RightFour,
    /// Both thumbs
    TwoThumbs,
    /// Any fingers, used as identification probes
    IdentifyAny,
}

const LEFT_FOUR: [FingerPosition; 4] = [
    FingerPosition::LeftIndex,
    FingerPosition::LeftMiddle,
    FingerPosition::LeftRing,
    FingerPosition::LeftLittle,
];

const RIGHT_FOUR: [FingerPosition; 4] = [
    FingerPosition::RightIndex,
    FingerPosition::RightMiddle,
    FingerPosition::RightRing,
    FingerPosition::RightLittle,
];

const TWO_THUMBS: [FingerPosition; 2] = [FingerPosition::RightThumb, FingerPosition::LeftThumb];

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::LeftFour => "left_four",
            CaptureKind::RightFour => "right_four",
            CaptureKind::TwoThumbs => "two_thumbs",
            CaptureKind::IdentifyAny => "identify_any",
        }
    }

    /// Ordered position list; segment i is labeled with entry i
    ///
    /// Empty for identification, which uses probe labels instead.
    pub fn positions(&self) -> &'static [FingerPosition] {
        match self {
            CaptureKind::LeftFour => &LEFT_FOUR,
            CaptureKind::RightFour => &RIGHT_FOUR,
            CaptureKind::TwoThumbs => &TWO_THUMBS,
            CaptureKind::IdentifyAny => &[],
        }
    }

    /// Finger count segmentation must detect, `None` when any count is accepted
    pub fn expected_fingers(&self) -> Option<usize> {
        match self {
            CaptureKind::IdentifyAny => None,
            kind => Some(kind.positions().len()),
        }
    }

    pub fn is_identification(&self) -> bool {
        matches!(self, CaptureKind::IdentifyAny)
    }

    /// Mirror of `position` within this kind's ordered list (i ↔ N-1-i)
    pub fn mirrored(&self, position: FingerPosition) -> Option<FingerPosition> {
        let positions = self.positions();
        let index = positions.iter().position(|p| *p == position)?;
        Some(positions[positions.len() - 1 - index])
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture type string not recognized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCaptureKind(pub String);

impl FromStr for CaptureKind {
    type Err = UnknownCaptureKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left_four" => Ok(CaptureKind::LeftFour),
            "right_four" => Ok(CaptureKind::RightFour),
            "two_thumbs" => Ok(CaptureKind::TwoThumbs),
            "identify_any" => Ok(CaptureKind::IdentifyAny),
            other => Err(UnknownCaptureKind(other.to_string())),
        }
    }
}

/// Anatomical finger positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerPosition {
    RightThumb,
    RightIndex,
    RightMiddle,
    RightRing,
    RightLittle,
    LeftThumb,
    LeftIndex,
    LeftMiddle,
    LeftRing,
    LeftLittle,
}

impl FingerPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerPosition::RightThumb => "right_thumb",
            FingerPosition::RightIndex => "right_index",
            FingerPosition::RightMiddle => "right_middle",
            FingerPosition::RightRing => "right_ring",
            FingerPosition::RightLittle => "right_little",
            FingerPosition::LeftThumb => "left_thumb",
            FingerPosition::LeftIndex => "left_index",
            FingerPosition::LeftMiddle => "left_middle",
            FingerPosition::LeftRing => "left_ring",
            FingerPosition::LeftLittle => "left_little",
        }
    }
}

impl fmt::Display for FingerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label attached to one segmented finger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionLabel {
    Finger(FingerPosition),
    /// 1-based probe index of an identification capture
    Probe(u8),
}

impl fmt::Display for PositionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionLabel::Finger(position) => write!(f, "{}", position),
            PositionLabel::Probe(n) => write!(f, "probe_{}", n),
        }
    }
}

/// Manual verification slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateSlot {
    First,
    Second,
}

impl TemplateSlot {
    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            1 => Some(TemplateSlot::First),
            2 => Some(TemplateSlot::Second),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            TemplateSlot::First => 1,
            TemplateSlot::Second => 2,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.number() as usize - 1
    }
}

/// What a capture feeds into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Store the combined template in a verification slot
    Manual(TemplateSlot),
    /// Accumulate into the enrollment record
    Enrollment,
    /// Use the templates as 1:N probes
    Identification,
}

/// Runtime-tunable capture settings (changed by `/api/config`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureSettings {
    pub quality_threshold: i32,
    #[serde(rename = "capture_timeout")]
    pub capture_timeout_secs: u64,
    pub fog_removal: bool,
}

impl CaptureSettings {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

/// Fixed timing of capture loops and enrollment pauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub phase_pause: Duration,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(100),
            phase_pause: Duration::from_millis(4000),
        }
    }
}

/// One capture run's parameters, fixed when the run starts
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest {
    pub kind: CaptureKind,
    pub mode: CaptureMode,
    pub settings: CaptureSettings,
    pub timing: CaptureTiming,
}

/// Best frame of a capture run
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub pixels: Vec<u8>,
    pub size: FrameSize,
    pub quality: i32,
    pub captured_at: DateTime<Utc>,
}

/// One finger after segmentation and templating
#[derive(Debug, Clone)]
pub struct FingerSegment {
    pub position: PositionLabel,
    pub image: Vec<u8>,
    /// Exactly `TEMPLATE_SIZE` bytes
    pub template: Vec<u8>,
}

/// Result of the segmentation pipeline
#[derive(Debug, Clone)]
pub struct SegmentedCapture {
    pub kind: CaptureKind,
    /// The slap (composite) image the segments were cut from
    pub composite: Vec<u8>,
    pub segments: Vec<FingerSegment>,
}

impl SegmentedCapture {
    /// Concatenation of all templates in segment order
    pub fn combined_template(&self) -> Vec<u8> {
        self.segments
            .iter()
            .flat_map(|segment| segment.template.iter().copied())
            .collect()
    }

    pub fn templates(&self) -> Vec<Vec<u8>> {
        self.segments.iter().map(|s| s.template.clone()).collect()
    }
}
