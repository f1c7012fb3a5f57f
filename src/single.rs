use image::GrayImage;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::face::Landmarks;
use crate::face_detection::{largest, FaceDetector};
use crate::face_landmarks::{LandmarkModel, LandmarkParams};
use crate::geometry::Rect;

/// Face box and landmarks for one still image.
#[derive(Debug, Clone, Serialize)]
pub struct FaceAnalysis {
    pub bbox: Rect,
    pub certainty: f64,
    pub landmarks: Landmarks,
}

/// One detector and one landmark engine working on independent still images.
pub struct SingleFaceAnalyzer {
    detector: Box<dyn FaceDetector>,
    model: Box<dyn LandmarkModel>,
    params: LandmarkParams,
}

impl SingleFaceAnalyzer {
    pub fn new(detector: Box<dyn FaceDetector>, model: Box<dyn LandmarkModel>) -> Self {
        Self {
            detector,
            model,
            params: LandmarkParams::default(),
        }
    }

    pub fn with_params(mut self, params: LandmarkParams) -> Self {
        self.params = params;
        self
    }

    /// The tallest face in the image.
    pub fn detect_face(&self, image: &GrayImage) -> Result<Rect> {
        let detections = self.detector.detect(image)?;
        largest(&detections)
            .map(|d| d.region)
            .ok_or(Error::NoFaceDetected)
    }

    /// Localises landmarks inside `face`, starting from a fresh engine state.
    pub fn landmarks(&mut self, image: &GrayImage, face: &Rect) -> Result<Landmarks> {
        self.model.reset();
        if !self.model.detect_landmarks(image, Some(face), &self.params) {
            return Err(Error::LandmarksFailed);
        }
        Ok(self.model.landmarks())
    }

    /// Detection followed by landmark localisation.
    pub fn analyze(&mut self, image: &GrayImage) -> Result<FaceAnalysis> {
        let face = self.detect_face(image)?;
        let landmarks = self.landmarks(image, &face)?;

        Ok(FaceAnalysis {
            bbox: self.model.bounding_box(),
            certainty: self.model.certainty(),
            landmarks,
        })
    }
}
