//! Segmentation and templating pipeline
//!
//! Turns the best frame of a capture run into labeled finger segments, each
//! carrying its own template:
//! 1. split the slap (composite) frame into single-finger images
//! 2. check the detected finger count against the capture kind
//! 3. create one template per finger, dropping fingers that fail
//! 4. label segments by position (probe labels for identification)
//! 5. mirror left-hand labels during enrollment
//!
//! The segmenter reports left-hand fingers little-to-index, so enrollment
//! captures of `left_four` are re-keyed so that position i holds the finger
//! found at position N-1-i.

use crate::capability::Scanner;
use crate::error::FlowError;
use crate::models::{
    CaptureKind, CaptureMode, CapturedFrame, FingerSegment, PositionLabel, SegmentedCapture,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SegmentationPipeline {
    scanner: Arc<dyn Scanner>,
}

impl SegmentationPipeline {
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self { scanner }
    }

    pub fn process(
        &self,
        frame: CapturedFrame,
        kind: CaptureKind,
        mode: CaptureMode,
    ) -> Result<SegmentedCapture, FlowError> {
        debug!(kind = %kind, quality = frame.quality, "Segmenting captured frame");

        let fingers = self
            .scanner
            .segment(&frame.pixels, frame.size)
            .map_err(|e| {
                warn!(kind = %kind, error = %e, "Segmentation failed");
                FlowError::SegmentationFailed(e)
            })?;

        if let Some(expected) = kind.expected_fingers() {
            if fingers.len() != expected {
                warn!(kind = %kind, expected, detected = fingers.len(), "Finger count mismatch");
                return Err(FlowError::SegmentationMismatch {
                    expected,
                    detected: fingers.len(),
                });
            }
        }

        let mirror = kind == CaptureKind::LeftFour && mode == CaptureMode::Enrollment;
        let positions = kind.positions();

        let mut segments = Vec::with_capacity(fingers.len());
        for (index, finger) in fingers.into_iter().enumerate() {
            let template = match self.scanner.create_template(&finger.image) {
                Ok(template) => template,
                Err(e) => {
                    debug!(kind = %kind, index, error = %e, "Dropping finger without template");
                    continue;
                }
            };

            let position = if kind.is_identification() {
                PositionLabel::Probe(index as u8 + 1)
            } else {
                let detected = positions[index];
                let position = if mirror {
                    kind.mirrored(detected).unwrap_or(detected)
                } else {
                    detected
                };
                PositionLabel::Finger(position)
            };

            segments.push(FingerSegment {
                position,
                image: finger.image,
                template,
            });
        }

        if segments.is_empty() {
            warn!(kind = %kind, "No templates created");
            return Err(FlowError::NoTemplates);
        }
        if mirror {
            debug!("Left-hand labels mirrored for enrollment");
        }
        info!(kind = %kind, segments = segments.len(), "Segmentation complete");

        Ok(SegmentedCapture {
            kind,
            composite: frame.pixels,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::simulated::SimulatedScanner;
    use crate::models::{FingerPosition, TemplateSlot};
    use chrono::Utc;

    fn pipeline(scanner: SimulatedScanner) -> SegmentationPipeline {
        SegmentationPipeline::new(Arc::new(scanner))
    }

    fn frame(scanner_size: crate::capability::FrameSize) -> CapturedFrame {
        CapturedFrame {
            pixels: vec![60; scanner_size.pixel_count()],
            size: scanner_size,
            quality: 60,
            captured_at: Utc::now(),
        }
    }

    fn default_frame() -> CapturedFrame {
        frame(SimulatedScanner::new().frame_size())
    }

    fn segment_at(capture: &SegmentedCapture, position: FingerPosition) -> &FingerSegment {
        capture
            .segments
            .iter()
            .find(|s| s.position == PositionLabel::Finger(position))
            .unwrap()
    }

    /// Segment index marker (1-based) stored under `position`
    fn marker(capture: &SegmentedCapture, position: FingerPosition) -> u8 {
        segment_at(capture, position).template[0]
    }

    #[test]
    fn test_right_hand_keeps_detected_order() {
        let capture = pipeline(SimulatedScanner::new())
            .process(default_frame(), CaptureKind::RightFour, CaptureMode::Enrollment)
            .unwrap();

        assert_eq!(marker(&capture, FingerPosition::RightIndex), 1);
        assert_eq!(marker(&capture, FingerPosition::RightLittle), 4);
        assert_eq!(capture.composite.len(), default_frame().pixels.len());
    }

    #[test]
    fn test_left_hand_enrollment_is_mirrored() {
        let capture = pipeline(SimulatedScanner::new())
            .process(default_frame(), CaptureKind::LeftFour, CaptureMode::Enrollment)
            .unwrap();

        assert_eq!(marker(&capture, FingerPosition::LeftIndex), 4);
        assert_eq!(marker(&capture, FingerPosition::LeftMiddle), 3);
        assert_eq!(marker(&capture, FingerPosition::LeftRing), 2);
        assert_eq!(marker(&capture, FingerPosition::LeftLittle), 1);
        // Images travel with their templates
        assert_eq!(segment_at(&capture, FingerPosition::LeftIndex).image[0], 4);
    }

    #[test]
    fn test_left_hand_manual_capture_not_mirrored() {
        let capture = pipeline(SimulatedScanner::new())
            .process(
                default_frame(),
                CaptureKind::LeftFour,
                CaptureMode::Manual(TemplateSlot::First),
            )
            .unwrap();

        assert_eq!(marker(&capture, FingerPosition::LeftIndex), 1);
        assert_eq!(marker(&capture, FingerPosition::LeftLittle), 4);
    }

    #[test]
    fn test_count_mismatch_stores_nothing() {
        let scanner = Arc::new(SimulatedScanner::new().with_finger_counts([3]));
        let pipeline = SegmentationPipeline::new(scanner.clone());

        let err = pipeline
            .process(default_frame(), CaptureKind::LeftFour, CaptureMode::Enrollment)
            .unwrap_err();

        assert!(matches!(
            err,
            FlowError::SegmentationMismatch {
                expected: 4,
                detected: 3
            }
        ));
        assert_eq!(scanner.segment_calls(), 1);
    }

    #[test]
    fn test_thumbs_expect_two() {
        let result = pipeline(SimulatedScanner::new()).process(
            default_frame(),
            CaptureKind::TwoThumbs,
            CaptureMode::Enrollment,
        );
        assert!(matches!(
            result,
            Err(FlowError::SegmentationMismatch {
                expected: 2,
                detected: 4
            })
        ));
    }

    #[test]
    fn test_identification_uses_probe_labels_for_any_count() {
        let capture = pipeline(SimulatedScanner::new().with_finger_counts([3]))
            .process(
                default_frame(),
                CaptureKind::IdentifyAny,
                CaptureMode::Identification,
            )
            .unwrap();

        let labels: Vec<String> = capture
            .segments
            .iter()
            .map(|s| s.position.to_string())
            .collect();
        assert_eq!(labels, ["probe_1", "probe_2", "probe_3"]);
    }

    #[test]
    fn test_failed_templates_are_dropped() {
        let capture = pipeline(SimulatedScanner::new().failing_templates([0, 2]))
            .process(
                default_frame(),
                CaptureKind::RightFour,
                CaptureMode::Manual(TemplateSlot::Second),
            )
            .unwrap();

        assert_eq!(capture.segments.len(), 2);
        assert_eq!(marker(&capture, FingerPosition::RightMiddle), 2);
        assert_eq!(marker(&capture, FingerPosition::RightLittle), 4);
        assert_eq!(capture.combined_template().len(), 2 * crate::capability::TEMPLATE_SIZE);
    }

    #[test]
    fn test_all_templates_failing() {
        let result = pipeline(SimulatedScanner::new().failing_templates([0, 1, 2, 3])).process(
            default_frame(),
            CaptureKind::RightFour,
            CaptureMode::Enrollment,
        );
        assert!(matches!(result, Err(FlowError::NoTemplates)));
    }
}
