pub mod model_blazeface;
pub mod model_cascade;

use std::fmt;
use std::str::FromStr;

use image::GrayImage;

use crate::error::Result;
use crate::geometry::Rect;

/// Which full-frame detector drives the detection cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorKind {
    /// Scored detector (reports a confidence per face)
    #[default]
    Hog,
    /// Cascade detector (no confidences)
    Haar,
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hog" | "hog-svm" => Ok(DetectorKind::Hog),
            "haar" | "cascade" => Ok(DetectorKind::Haar),
            other => Err(format!("unknown detector '{}', expected hog or haar", other)),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Hog => write!(f, "hog"),
            DetectorKind::Haar => write!(f, "haar"),
        }
    }
}

/// A raw face proposal from a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    pub region: Rect,
    /// `None` for detectors that do not score their output
    pub confidence: Option<f64>,
}

impl FaceDetection {
    pub fn scored(region: Rect, confidence: f64) -> Self {
        Self {
            region,
            confidence: Some(confidence),
        }
    }

    pub fn unscored(region: Rect) -> Self {
        Self {
            region,
            confidence: None,
        }
    }
}

/// Full-frame face search over a grayscale image.
///
/// Called through a shared reference: implementations must not need exclusive
/// access, or must synchronise internally.
pub trait FaceDetector {
    fn kind(&self) -> DetectorKind;

    fn detect(&self, frame: &GrayImage) -> Result<Vec<FaceDetection>>;
}

/// The detection with the tallest region.
pub fn largest(detections: &[FaceDetection]) -> Option<&FaceDetection> {
    detections
        .iter()
        .max_by(|a, b| a.region.height.total_cmp(&b.region.height))
}

/// Greedy non-maximum suppression by confidence; unscored detections rank last.
pub fn non_max_suppression(mut detections: Vec<FaceDetection>, iou_threshold: f64) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .unwrap_or(f64::MIN)
            .total_cmp(&a.confidence.unwrap_or(f64::MIN))
    });

    let mut kept: Vec<FaceDetection> = Vec::with_capacity(detections.len());
    for detection in detections {
        if kept
            .iter()
            .all(|k| k.region.iou(&detection.region) <= iou_threshold)
        {
            kept.push(detection);
        }
    }
    kept
}
