use std::path::Path;
use std::sync::Mutex;

use image::GrayImage;
use rustface::ImageData;
use tracing::debug;

use crate::error::{Error, Result};
use crate::face_detection::{DetectorKind, FaceDetection, FaceDetector};
use crate::geometry::Rect;

pub const DEFAULT_MIN_FACE_SIZE: u32 = 40;

/// Unscored full-frame detector backed by a SeetaFace funnel cascade.
///
/// The cascade keeps scratch buffers and needs `&mut` to run, so it sits behind a
/// mutex and the detector can be shared by reference like the scored one.
pub struct CascadeDetector {
    cascade: Mutex<Box<dyn rustface::Detector>>,
}

impl CascadeDetector {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let path = model_path.as_ref();
        let path = path
            .to_str()
            .ok_or_else(|| Error::model_load("face cascade", "model path is not valid UTF-8"))?;

        let mut cascade =
            rustface::create_detector(path).map_err(|e| Error::model_load("face cascade", e))?;

        cascade.set_min_face_size(DEFAULT_MIN_FACE_SIZE);
        cascade.set_score_thresh(2.0);
        cascade.set_pyramid_scale_factor(0.8);
        cascade.set_slide_window_step(4, 4);

        Ok(Self {
            cascade: Mutex::new(cascade),
        })
    }
}

impl FaceDetector for CascadeDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Haar
    }

    fn detect(&self, frame: &GrayImage) -> Result<Vec<FaceDetection>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let image = ImageData::new(frame.as_raw(), width, height);

        let faces = {
            let mut cascade = self
                .cascade
                .lock()
                .map_err(|_| Error::Config("face cascade lock poisoned".into()))?;
            cascade.detect(&image)
        };

        let detections: Vec<FaceDetection> = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceDetection::unscored(Rect::new(
                    bbox.x() as f64,
                    bbox.y() as f64,
                    bbox.width() as f64,
                    bbox.height() as f64,
                ))
            })
            .collect();

        debug!(faces = detections.len(), "cascade detection");
        Ok(detections)
    }
}
