use std::sync::atomic::{AtomicBool, Ordering};

use crate::face_detection::FaceDetection;
use crate::geometry::Rect;

/// A detector proposal waiting to be claimed by an idle slot.
///
/// Lives for one frame. The claim flag is the only state slots share while they
/// update in parallel.
#[derive(Debug)]
pub struct DetectionCandidate {
    pub region: Rect,
    pub confidence: Option<f64>,
    claimed: AtomicBool,
}

impl DetectionCandidate {
    pub fn new(region: Rect, confidence: Option<f64>) -> Self {
        Self {
            region,
            confidence,
            claimed: AtomicBool::new(false),
        }
    }

    /// Takes the candidate. Returns `true` for exactly one caller.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl From<FaceDetection> for DetectionCandidate {
    fn from(detection: FaceDetection) -> Self {
        Self::new(detection.region, detection.confidence)
    }
}

/// Whether the full-frame detector runs on this frame: every `interval` frames,
/// and only while some slot is idle.
pub fn should_detect(frame_index: u64, interval: u64, all_active: bool) -> bool {
    interval > 0 && frame_index % interval == 0 && !all_active
}

/// Drops every candidate whose overlap ratio with any tracked box exceeds
/// `threshold`. Returns how many were dropped.
pub fn suppress_overlapping(
    candidates: &mut Vec<DetectionCandidate>,
    tracked: &[Rect],
    threshold: f64,
) -> usize {
    let before = candidates.len();
    candidates.retain(|candidate| {
        !tracked
            .iter()
            .any(|bbox| bbox.overlap_ratio(&candidate.region) > threshold)
    });
    before - candidates.len()
}
