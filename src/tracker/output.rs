use serde::Serialize;

use crate::face::TrackedFace;
use crate::frame_source::CameraIntrinsics;
use crate::tracker::slot::SlotPool;

/// Everything reported for one processed frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub frame_index: u64,
    /// At least one face cleared the visualisation boundary
    pub found: bool,
    pub active_slots: usize,
    pub fps: Option<f64>,
    pub intrinsics: CameraIntrinsics,
    pub faces: Vec<TrackedFace>,
}

impl FrameResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Collects the faces worth reporting, in slot order.
///
/// A slot is included when its engine certainty is below `visualisation_boundary`;
/// lower certainty values mean a more reliable track.
pub fn aggregate(pool: &SlotPool, visualisation_boundary: f64) -> Vec<TrackedFace> {
    pool.slots()
        .iter()
        .enumerate()
        .filter_map(|(slot, s)| {
            let model = s.model();
            let certainty = model.certainty();
            (certainty < visualisation_boundary).then(|| TrackedFace {
                slot,
                bbox: model.bounding_box(),
                certainty,
                landmarks: model.landmarks(),
            })
        })
        .collect()
}
