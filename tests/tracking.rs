mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{frame, models, tracker, FakeModel, ScriptedDetector};
use multiface::face_landmarks::LandmarkModel;
use multiface::geometry::Rect;
use multiface::{Error, Tracker, TrackerConfig};

fn face(x: f64) -> Rect {
    Rect::new(x, 100.0, 150.0, 150.0)
}

#[test]
fn one_candidate_activates_exactly_one_slot() {
    let mut tracker = tracker(2, ScriptedDetector::new(vec![vec![face(50.0)]]));

    let result = tracker.track(&frame(0));

    assert_eq!(result.active_slots, 1);
    assert_eq!(tracker.pool().num_active(), 1);
    assert!(!tracker.pool().all_active());
    assert_eq!(result.faces.len(), 1);
    assert_eq!(result.faces[0].bbox, face(50.0));
    assert!(result.found);
}

#[test]
fn candidate_inside_a_tracked_face_is_suppressed() {
    let tracked = Rect::new(100.0, 100.0, 200.0, 200.0);
    let inside = Rect::new(120.0, 120.0, 160.0, 160.0);
    let detector = ScriptedDetector::new(vec![vec![tracked], vec![inside, tracked]]);
    let calls = Arc::clone(&detector.calls);
    let mut tracker = tracker(2, detector);

    assert_eq!(tracker.track(&frame(0)).active_slots, 1);
    for index in 1..8 {
        tracker.track(&frame(index));
    }

    let result = tracker.track(&frame(8));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.active_slots, 1);
    assert_eq!(result.faces.len(), 1);
    assert_eq!(result.faces[0].bbox, tracked);
}

#[test]
fn failing_slot_is_reclaimed_before_it_can_claim() {
    let model = FakeModel::new(true, false);
    let resets = Arc::clone(&model.resets);
    let config = TrackerConfig::default().with_num_faces_max(1);
    let mut tracker = Tracker::new(
        config,
        Box::new(ScriptedDetector::repeating(vec![face(50.0)], 4)),
        vec![Box::new(model) as Box<dyn LandmarkModel>],
    )
    .unwrap();

    assert_eq!(tracker.track(&frame(0)).active_slots, 1);
    assert_eq!(resets.load(Ordering::SeqCst), 1);

    // five tracking failures in a row: still active, but nothing reported
    for index in 1..=5 {
        let result = tracker.track(&frame(index));
        assert_eq!(result.active_slots, 1);
        assert!(!result.found);
    }
    assert_eq!(tracker.pool().slots()[0].consecutive_failures(), 5);

    let result = tracker.track(&frame(6));
    assert_eq!(result.active_slots, 0);
    assert_eq!(resets.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.pool().slots()[0].consecutive_failures(), 0);

    // the next detection cycle hands it a face again
    tracker.track(&frame(7));
    assert_eq!(tracker.track(&frame(8)).active_slots, 1);
}

#[test]
fn detector_is_skipped_while_every_slot_is_busy() {
    let detector = ScriptedDetector::repeating(vec![face(50.0), face(300.0)], 10);
    let calls = Arc::clone(&detector.calls);
    let mut tracker = tracker(2, detector);

    assert_eq!(tracker.track(&frame(0)).active_slots, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for index in 1..=16 {
        let result = tracker.track(&frame(index));
        assert_eq!(result.active_slots, 2);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn detector_runs_only_on_the_cadence() {
    let detector = ScriptedDetector::new(Vec::new());
    let calls = Arc::clone(&detector.calls);
    let mut tracker = tracker(2, detector);

    for index in 0..=24 {
        tracker.track(&frame(index));
    }
    // frames 0, 8, 16 and 24
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn each_candidate_is_claimed_once_under_contention() {
    for _ in 0..20 {
        let faces = vec![face(0.0), face(200.0), face(400.0)];
        let mut tracker = tracker(8, ScriptedDetector::new(vec![faces.clone()]));

        let result = tracker.track(&frame(0));
        assert_eq!(result.active_slots, 3);

        let boxes: Vec<Rect> = result.faces.iter().map(|f| f.bbox).collect();
        assert_eq!(boxes.len(), 3);
        let distinct: HashSet<u64> = boxes.iter().map(|b| b.x.to_bits()).collect();
        assert_eq!(distinct.len(), 3);
    }
}

#[test]
fn active_slots_never_exceed_capacity() {
    let faces: Vec<Rect> = (0..6).map(|i| face(i as f64 * 100.0 + 1.0)).collect();
    let mut tracker = tracker(2, ScriptedDetector::repeating(faces, 10));

    for index in 0..40 {
        let result = tracker.track(&frame(index));
        assert!(result.active_slots <= 2);
        assert!(result.faces.len() <= 2);
    }
    assert_eq!(tracker.pool().num_active(), 2);
}

#[test]
fn failed_initialisation_leaves_slots_idle() {
    let config = TrackerConfig::default().with_num_faces_max(2);
    let mut tracker = Tracker::new(
        config,
        Box::new(ScriptedDetector::new(vec![vec![face(0.0), face(300.0)]])),
        models(2, false, true),
    )
    .unwrap();

    let result = tracker.track(&frame(0));
    assert_eq!(result.active_slots, 0);
    assert!(!result.found);
}

#[test]
fn results_come_back_in_slot_order() {
    let mut tracker = tracker(4, ScriptedDetector::new(vec![vec![face(0.0), face(200.0), face(400.0), face(600.0)]]));

    let result = tracker.track(&frame(0));
    let slots: Vec<usize> = result.faces.iter().map(|f| f.slot).collect();
    assert_eq!(slots, vec![0, 1, 2, 3]);
}

#[test]
fn boundary_filters_reported_faces() {
    let config = TrackerConfig::default()
        .with_num_faces_max(1)
        .with_visualisation_boundary(-0.95);
    let mut tracker = Tracker::new(
        config,
        Box::new(ScriptedDetector::new(vec![vec![face(0.0)]])),
        models(1, true, true),
    )
    .unwrap();

    let result = tracker.track(&frame(0));
    assert_eq!(result.active_slots, 1);
    assert!(!result.found);
}

#[test]
fn start_up_fails_without_a_model_per_slot() {
    let config = TrackerConfig::default().with_num_faces_max(2);
    let result = Tracker::new(config, Box::new(ScriptedDetector::new(Vec::new())), models(1, true, true));
    assert!(matches!(result, Err(Error::Config(_))));

    let config = TrackerConfig::default().with_num_faces_max(0);
    let result = Tracker::new(config, Box::new(ScriptedDetector::new(Vec::new())), Vec::new());
    assert!(matches!(result, Err(Error::Config(_))));
}
