use crate::error::{Error, Result};
use crate::face_detection::DetectorKind;
use crate::face_landmarks::LandmarkParams;

/// Full-frame face search runs on every n-th frame.
pub const DETECTION_INTERVAL: u64 = 8;

/// A slot is reclaimed once its engine failed more often than this in a row.
pub const MAX_FAILURES_IN_A_ROW: u32 = 4;

/// Detections overlapping an active slot above this ratio are dropped.
pub const OVERLAP_THRESHOLD: f64 = 0.5;

/// Faces are reported when their certainty is below this value (lower = more certain).
pub const DEFAULT_VISUALISATION_BOUNDARY: f64 = -0.1;

pub const DEFAULT_NUM_FACES_MAX: usize = 4;

/// Camera parameters as given by the user, any of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraConfig {
    pub fx: Option<f64>,
    pub fy: Option<f64>,
    pub cx: Option<f64>,
    pub cy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Capacity of the slot pool
    pub num_faces_max: usize,
    pub detection_interval: u64,
    pub max_failures_in_a_row: u32,
    pub overlap_threshold: f64,
    pub visualisation_boundary: f64,
    pub detector: DetectorKind,
    pub camera: CameraConfig,
    pub landmarks: LandmarkParams,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            num_faces_max: DEFAULT_NUM_FACES_MAX,
            detection_interval: DETECTION_INTERVAL,
            max_failures_in_a_row: MAX_FAILURES_IN_A_ROW,
            overlap_threshold: OVERLAP_THRESHOLD,
            visualisation_boundary: DEFAULT_VISUALISATION_BOUNDARY,
            detector: DetectorKind::Hog,
            camera: CameraConfig::default(),
            landmarks: LandmarkParams::default(),
        }
    }
}

impl TrackerConfig {
    pub fn with_num_faces_max(mut self, num_faces_max: usize) -> Self {
        self.num_faces_max = num_faces_max;
        self
    }

    pub fn with_visualisation_boundary(mut self, boundary: f64) -> Self {
        self.visualisation_boundary = boundary;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_faces_max == 0 {
            return Err(Error::Config("num_faces_max must be at least 1".into()));
        }
        if self.detection_interval == 0 {
            return Err(Error::Config("detection interval must be at least 1".into()));
        }
        if !self.overlap_threshold.is_finite() || self.overlap_threshold < 0.0 {
            return Err(Error::Config(format!(
                "overlap threshold {} is not a non-negative number",
                self.overlap_threshold
            )));
        }
        if !self.visualisation_boundary.is_finite() {
            return Err(Error::Config("visualisation boundary must be finite".into()));
        }
        for (name, value) in [
            ("fx", self.camera.fx),
            ("fy", self.camera.fy),
            ("cx", self.camera.cx),
            ("cy", self.camera.cy),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::Config(format!("camera {} = {} is invalid", name, v)));
                }
            }
        }
        self.landmarks.validate()
    }
}
