//! Flow tests on virtual time
//!
//! Every flow runs against the simulated scanner; `start_paused` lets the
//! capture loops, settle delays and enrollment pauses complete instantly.

mod common;

use base64::{engine::general_purpose, Engine as _};
use common::{drain, empty_repository, ready_context, simulated_template, FixedRepository};
use livescan_agent::capability::simulated::SimulatedScanner;
use livescan_agent::error::FlowError;
use livescan_agent::flows::SettingsUpdate;
use livescan_agent::models::{CaptureKind, EnrollmentState, FingerPosition, ImageKey};
use livescan_agent::services::EnrolledIdentity;
use livescan_agent::session::FlowKind;
use livescan_common::events::{AgentEvent, EnrollmentStepId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn enrollment_scanner() -> SimulatedScanner {
    SimulatedScanner::new()
        .then_steady(70)
        .with_finger_counts([4, 4, 2])
}

fn steps(events: &[AgentEvent]) -> Vec<EnrollmentStepId> {
    events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::EnrollmentStep { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

fn capture_results(events: &[AgentEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::CaptureResult { success, .. } => Some(*success),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_enrollment_collects_complete_record() {
    let (ctx, _) = ready_context(enrollment_scanner(), empty_repository());
    let mut rx = ctx.events().subscribe();
    let started = Instant::now();

    let flow = ctx.start_enrollment().unwrap();
    assert_eq!(flow.kind, FlowKind::Enrollment);
    flow.task.await.unwrap();

    // Three 2 s settles and two 4 s pauses
    assert_eq!(started.elapsed(), Duration::from_secs(14));
    assert_eq!(ctx.session().enrollment_state(), EnrollmentState::Finished);
    assert!(!ctx.session().is_busy());

    let events = drain(&mut rx);
    assert_eq!(
        steps(&events),
        vec![
            EnrollmentStepId::LeftHand,
            EnrollmentStepId::RightHand,
            EnrollmentStepId::RightHand,
            EnrollmentStepId::Thumbs,
            EnrollmentStepId::Thumbs,
            EnrollmentStepId::Finished,
        ]
    );
    assert_eq!(capture_results(&events), vec![true, true, true]);

    let record = ctx.take_enrollment().unwrap();
    assert!(record.is_complete());
    // Left hand mirrored, right hand and thumbs in detected order
    assert_eq!(record.template(FingerPosition::LeftIndex).unwrap()[0], 4);
    assert_eq!(record.template(FingerPosition::LeftLittle).unwrap()[0], 1);
    assert_eq!(record.template(FingerPosition::RightIndex).unwrap()[0], 1);
    assert_eq!(record.template(FingerPosition::RightThumb).unwrap()[0], 1);
    assert_eq!(record.template(FingerPosition::LeftThumb).unwrap()[0], 2);
    assert!(record.image(ImageKey::Slap(CaptureKind::TwoThumbs)).is_some());

    // Single use
    assert!(matches!(
        ctx.take_enrollment(),
        Err(FlowError::IncompleteData { templates: 0, images: 0 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_enrollment_failure_keeps_completed_phases() {
    let scanner = SimulatedScanner::new()
        .then_steady(70)
        .with_finger_counts([4, 3]);
    let (ctx, _) = ready_context(scanner, empty_repository());
    let mut rx = ctx.events().subscribe();

    ctx.start_enrollment().unwrap().task.await.unwrap();

    assert_eq!(ctx.session().enrollment_state(), EnrollmentState::Failed);
    assert!(!ctx.session().is_busy());
    assert_eq!(ctx.session().enrollment_counts(), (4, 5));

    let events = drain(&mut rx);
    assert_eq!(steps(&events).last(), Some(&EnrollmentStepId::Failed));
    assert_eq!(capture_results(&events), vec![true, false]);
    let failure = events
        .iter()
        .find_map(|event| match event {
            AgentEvent::CaptureResult {
                success: false,
                message,
                ..
            } => Some(message.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(failure, "Expected 4 fingers, detected 3");

    assert!(matches!(
        ctx.take_enrollment(),
        Err(FlowError::IncompleteData { templates: 4, images: 5 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_new_enrollment_discards_previous_record() {
    let scanner = SimulatedScanner::new()
        .then_steady(70)
        .with_finger_counts([4, 1, 1]);
    let (ctx, _) = ready_context(scanner, empty_repository());

    ctx.start_enrollment().unwrap().task.await.unwrap();
    assert_eq!(ctx.session().enrollment_counts(), (4, 5));

    // Third segmentation yields 1 finger, so the second run fails at once
    ctx.start_enrollment().unwrap().task.await.unwrap();
    assert_eq!(ctx.session().enrollment_counts(), (0, 0));
    assert_eq!(ctx.session().enrollment_state(), EnrollmentState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_pause() {
    let (ctx, _) = ready_context(enrollment_scanner(), empty_repository());
    let mut rx = ctx.events().subscribe();

    let flow = ctx.start_enrollment().unwrap();
    // Left hand settles at 2 s; the pause runs until 6 s
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        ctx.session().enrollment_state(),
        EnrollmentState::PauseBeforeRightHand
    );
    assert_eq!(ctx.cancel(), Some(FlowKind::Enrollment));
    flow.task.await.unwrap();

    assert_eq!(ctx.session().enrollment_state(), EnrollmentState::Failed);
    assert_eq!(ctx.session().enrollment_counts(), (4, 5));
    assert!(!ctx.session().is_busy());
    assert_eq!(ctx.cancel(), None);

    let events = drain(&mut rx);
    assert_eq!(steps(&events).last(), Some(&EnrollmentStepId::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_busy_rejection_leaves_state_unchanged() {
    let (ctx, _) = ready_context(enrollment_scanner(), empty_repository());

    let flow = ctx.start_enrollment().unwrap();

    assert!(matches!(
        ctx.start_identification(),
        Err(FlowError::Busy(ref kind)) if kind == "enrollment"
    ));
    assert!(matches!(
        ctx.start_manual_capture(1, "right_four"),
        Err(FlowError::Busy(_))
    ));
    assert!(matches!(ctx.start_enrollment(), Err(FlowError::Busy(_))));
    assert_eq!(ctx.session().active_flow(), Some(FlowKind::Enrollment));
    assert_eq!(ctx.session().slot_occupancy(), [false, false]);

    flow.task.await.unwrap();
    assert_eq!(ctx.session().enrollment_state(), EnrollmentState::Finished);
    assert!(ctx.take_enrollment().unwrap().is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_flows_require_initialization() {
    let (ctx, _) = common::context(enrollment_scanner(), empty_repository());

    assert!(matches!(ctx.start_enrollment(), Err(FlowError::NotInitialized)));
    assert!(matches!(ctx.start_identification(), Err(FlowError::NotInitialized)));
    assert!(matches!(
        ctx.start_manual_capture(1, "left_four"),
        Err(FlowError::NotInitialized)
    ));
    assert!(!ctx.session().is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_manual_capture_and_verification() {
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(70), empty_repository());
    let mut rx = ctx.events().subscribe();

    assert!(matches!(ctx.verify_slots(), Err(FlowError::MissingTemplates)));

    ctx.start_manual_capture(1, "right_four").unwrap().task.await.unwrap();
    assert!(matches!(ctx.verify_slots(), Err(FlowError::MissingTemplates)));
    ctx.start_manual_capture(2, "right_four").unwrap().task.await.unwrap();

    let result = ctx.verify_slots().unwrap();
    assert!(result.success);
    assert!(result.matched);
    assert_eq!(result.score, Some(100));

    let events = drain(&mut rx);
    let slots: Vec<Option<u8>> = events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::CaptureResult {
                success: true,
                template_no,
                capture_type,
                ..
            } => {
                assert_eq!(capture_type.as_deref(), Some("right_four"));
                Some(*template_no)
            }
            _ => None,
        })
        .collect();
    assert_eq!(slots, vec![Some(1), Some(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_verification_threshold_boundary() {
    for (score, matched) in [(45, true), (44, false)] {
        let scanner = SimulatedScanner::new()
            .then_steady(70)
            .with_comparator(move |_, _| score);
        let (ctx, _) = ready_context(scanner, empty_repository());
        ctx.start_manual_capture(1, "right_four").unwrap().task.await.unwrap();
        ctx.start_manual_capture(2, "left_four").unwrap().task.await.unwrap();

        let result = ctx.verify_slots().unwrap();
        assert!(result.success);
        assert_eq!(result.matched, matched, "score {}", score);
        assert_eq!(result.score, Some(score));
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_capture_leaves_slot_empty() {
    // Four fingers detected where two thumbs are expected
    let (ctx, scanner) = ready_context(SimulatedScanner::new().then_steady(70), empty_repository());
    let mut rx = ctx.events().subscribe();

    ctx.start_manual_capture(1, "two_thumbs").unwrap().task.await.unwrap();

    assert_eq!(scanner.segment_calls(), 1);
    assert_eq!(ctx.session().slot_occupancy(), [false, false]);
    assert!(matches!(ctx.verify_slots(), Err(FlowError::MissingTemplates)));
    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [AgentEvent::CaptureResult { success: false, message, .. }]
            if message == "Expected 2 fingers, detected 4"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_manual_capture_rejects_bad_arguments() {
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(70), empty_repository());

    assert!(matches!(
        ctx.start_manual_capture(3, "right_four"),
        Err(FlowError::InvalidSlot(3))
    ));
    assert!(matches!(
        ctx.start_manual_capture(1, "identify_any"),
        Err(FlowError::UnsupportedKind(_))
    ));
    assert!(matches!(
        ctx.start_manual_capture(1, "both_hands"),
        Err(FlowError::UnsupportedKind(ref name)) if name == "both_hands"
    ));
    assert!(!ctx.session().is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_manual_capture_timeout_releases_session() {
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(0), empty_repository());
    let mut rx = ctx.events().subscribe();

    ctx.start_manual_capture(1, "right_four").unwrap().task.await.unwrap();

    assert!(!ctx.session().is_busy());
    assert_eq!(ctx.session().slot_occupancy(), [false, false]);
    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [AgentEvent::CaptureResult { success: false, message, template_no: Some(1), .. }]
            if message == "No image captured"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_huge_capture_timeout_still_completes() {
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(70), empty_repository());
    // Largest value /api/config accepts
    ctx.configure(SettingsUpdate {
        capture_timeout_secs: Some(i64::MAX as u64),
        ..Default::default()
    });
    let mut rx = ctx.events().subscribe();

    ctx.start_manual_capture(1, "right_four").unwrap().task.await.unwrap();

    assert_eq!(ctx.session().slot_occupancy(), [true, false]);
    assert!(!ctx.session().is_busy());
    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [AgentEvent::CaptureResult { success: true, template_no: Some(1), .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_huge_capture_timeout_enrollment_can_be_cancelled() {
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(0), empty_repository());
    ctx.configure(SettingsUpdate {
        capture_timeout_secs: Some(u64::MAX),
        ..Default::default()
    });
    let mut rx = ctx.events().subscribe();

    let flow = ctx.start_enrollment().unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        ctx.session().enrollment_state(),
        EnrollmentState::LeftHandCapture
    );
    ctx.cancel();
    flow.task.await.unwrap();

    assert_eq!(ctx.session().enrollment_state(), EnrollmentState::Failed);
    let events = drain(&mut rx);
    assert_eq!(capture_results(&events), vec![false]);
    assert_eq!(steps(&events).last(), Some(&EnrollmentStepId::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_identification_capture_failure_reports_both_results() {
    let (ctx, scanner) = ready_context(SimulatedScanner::new().then_steady(0), empty_repository());
    let mut rx = ctx.events().subscribe();

    ctx.start_identification().unwrap().task.await.unwrap();

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [
            AgentEvent::IdentificationStep { .. },
            AgentEvent::CaptureResult { success: false, capture_type: Some(kind), message, .. },
            AgentEvent::IdentificationResult { success: false, found: false, .. },
        ] if kind == "identify_any" && message == "No image captured"
    ));
    assert_eq!(scanner.segment_calls(), 0);
    assert!(!ctx.session().is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_identification_finds_enrolled_person() {
    let stored = [simulated_template(9), simulated_template(3)].concat();
    let repository = Arc::new(FixedRepository(Ok(vec![EnrolledIdentity {
        name: "Siti Rahma".to_string(),
        id_number: "3171-0042".to_string(),
        combined_template_base64: Some(general_purpose::STANDARD.encode(stored)),
    }])));
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(70), repository);
    let mut rx = ctx.events().subscribe();

    ctx.start_identification().unwrap().task.await.unwrap();

    let events = drain(&mut rx);
    let result = events.last().unwrap();
    match result {
        AgentEvent::IdentificationResult {
            success,
            found,
            name,
            id_number,
            score,
            ..
        } => {
            assert!(*success && *found);
            assert_eq!(name.as_deref(), Some("Siti Rahma"));
            assert_eq!(id_number.as_deref(), Some("3171-0042"));
            assert_eq!(*score, Some(100));
        }
        other => panic!("unexpected final event {:?}", other),
    }
    assert!(!ctx.session().is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_identification_reports_unavailable_repository() {
    let repository = Arc::new(FixedRepository(Err("connection refused".to_string())));
    let (ctx, _) = ready_context(SimulatedScanner::new().then_steady(70), repository);
    let mut rx = ctx.events().subscribe();

    ctx.start_identification().unwrap().task.await.unwrap();

    let events = drain(&mut rx);
    match events.last() {
        Some(AgentEvent::IdentificationResult {
            success: false,
            found: false,
            message: Some(message),
            ..
        }) => assert_eq!(
            message,
            "Template repository unavailable: Network error: connection refused"
        ),
        other => panic!("unexpected final event {:?}", other),
    }
    // The capture itself succeeded
    assert_eq!(capture_results(&events), Vec::<bool>::new());
}

#[tokio::test(start_paused = true)]
async fn test_identification_empty_repository_is_not_found() {
    let (ctx, scanner) = ready_context(SimulatedScanner::new().then_steady(70), empty_repository());
    let mut rx = ctx.events().subscribe();

    ctx.start_identification().unwrap().task.await.unwrap();

    let events = drain(&mut rx);
    assert!(matches!(
        events.last(),
        Some(AgentEvent::IdentificationResult { success: true, found: false, .. })
    ));
    assert_eq!(scanner.compare_calls(), 0);
}
