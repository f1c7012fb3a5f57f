#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, GrayImage};
use multiface::face::Landmarks;
use multiface::face_detection::{DetectorKind, FaceDetection, FaceDetector};
use multiface::face_landmarks::{LandmarkModel, LandmarkParams, RESET_CERTAINTY};
use multiface::frame_source::Frame;
use multiface::geometry::Rect;
use multiface::{Result, Tracker, TrackerConfig};

/// Detector replaying one list of faces per call, then finding nothing.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Vec<Rect>>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Rect>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Same faces on every call.
    pub fn repeating(faces: Vec<Rect>, calls: usize) -> Self {
        Self::new(vec![faces; calls])
    }
}

impl FaceDetector for ScriptedDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Hog
    }

    fn detect(&self, _frame: &GrayImage) -> Result<Vec<FaceDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let faces = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(faces
            .into_iter()
            .map(|r| FaceDetection::scored(r, 0.9))
            .collect())
    }
}

/// Engine that locks onto its seed region and keeps it while tracking.
pub struct FakeModel {
    bbox: Option<Rect>,
    init_ok: bool,
    track_ok: bool,
    last_ok: bool,
    pub resets: Arc<AtomicUsize>,
}

impl FakeModel {
    pub fn new(init_ok: bool, track_ok: bool) -> Self {
        Self {
            bbox: None,
            init_ok,
            track_ok,
            last_ok: false,
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl LandmarkModel for FakeModel {
    fn reset(&mut self) {
        self.bbox = None;
        self.last_ok = false;
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn detect_landmarks(
        &mut self,
        _frame: &GrayImage,
        region: Option<&Rect>,
        _params: &LandmarkParams,
    ) -> bool {
        self.last_ok = match region {
            Some(region) => {
                self.bbox = Some(*region);
                self.init_ok
            }
            None => self.bbox.is_some() && self.track_ok,
        };
        self.last_ok
    }

    fn bounding_box(&self) -> Rect {
        self.bbox.unwrap_or_default()
    }

    fn certainty(&self) -> f64 {
        if self.bbox.is_some() && self.last_ok {
            -0.9
        } else {
            RESET_CERTAINTY
        }
    }

    fn landmarks(&self) -> Landmarks {
        match self.bbox {
            Some(r) => Landmarks::from_xy(&[r.x, r.y, r.right(), r.bottom()]),
            None => Landmarks::empty(),
        }
    }
}

pub fn models(capacity: usize, init_ok: bool, track_ok: bool) -> Vec<Box<dyn LandmarkModel>> {
    (0..capacity)
        .map(|_| Box::new(FakeModel::new(init_ok, track_ok)) as Box<dyn LandmarkModel>)
        .collect()
}

pub fn tracker(capacity: usize, detector: ScriptedDetector) -> Tracker {
    let config = TrackerConfig::default().with_num_faces_max(capacity);
    Tracker::new(config, Box::new(detector), models(capacity, true, true)).unwrap()
}

pub fn frame(index: u64) -> Frame {
    Frame::new(index, DynamicImage::new_luma8(640, 480))
}
