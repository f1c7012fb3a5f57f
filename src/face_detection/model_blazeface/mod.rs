use std::cmp::min;
use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use ndarray::prelude::*;
use ndarray::CowArray;
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, Session, SessionBuilder, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::face_detection::{non_max_suppression, DetectorKind, FaceDetection, FaceDetector};
use crate::geometry::Rect;

const INPUT_SIZE: u32 = 256;

// box (4) + six keypoints (12) per anchor
const NUM_COORDS: usize = 16;

pub const DEFAULT_MIN_SCORE: f32 = 0.75;
pub const DEFAULT_NMS_THRESHOLD: f64 = 0.3;

/// Scored full-frame detector running the BlazeFace (back camera, 256x256) model.
pub struct BlazefaceDetector {
    session: Arc<Session>,
    // one row per anchor: [x_center, y_center, w, h], normalised
    anchors: Array2<f32>,
    min_score: f32,
    nms_threshold: f64,
}

/// Square region of the frame that was fed to the network.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CropBox {
    x: u32,
    y: u32,
    side: u32,
}

impl CropBox {
    fn centered(width: u32, height: u32) -> Self {
        let side = min(width, height);
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            side,
        }
    }

    // normalised [xmin, ymin, xmax, ymax] to frame pixels
    fn to_frame(self, b: [f32; 4]) -> Rect {
        let side = self.side as f64;
        Rect::from_corners(
            self.x as f64 + b[0] as f64 * side,
            self.y as f64 + b[1] as f64 * side,
            self.x as f64 + b[2] as f64 * side,
            self.y as f64 + b[3] as f64 * side,
        )
    }
}

impl BlazefaceDetector {
    pub fn load(
        environment: &Arc<Environment>,
        model_path: impl AsRef<Path>,
        anchors_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let session = SessionBuilder::new(environment)
            .and_then(|builder| builder.with_intra_threads(2))
            .and_then(|builder| builder.with_model_from_file(model_path.as_ref()))
            .map_err(|e| Error::model_load("face detection model", e))?;

        let anchors: Array2<f64> = ndarray_npy::read_npy(anchors_path.as_ref())
            .map_err(|e| Error::model_load("detector anchors", e))?;

        Self::from_parts(Arc::new(session), anchors.mapv(|x| x as f32))
    }

    fn from_parts(session: Arc<Session>, anchors: Array2<f32>) -> Result<Self> {
        if anchors.ncols() < 4 || anchors.nrows() == 0 {
            return Err(Error::model_load(
                "detector anchors",
                format!("expected N x 4 anchors, got {:?}", anchors.shape()),
            ));
        }

        Ok(Self {
            session,
            anchors,
            min_score: DEFAULT_MIN_SCORE,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        })
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    fn run_network(&self, input: Vec<f32>) -> Result<(Vec<f32>, Vec<f32>)> {
        let array: CowArray<_, _> = Array::from_shape_vec(
            (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
            input,
        )?
        .into_dyn()
        .into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;

        if outputs.len() < 4 {
            return Err(Error::model_load(
                "face detection model",
                format!("expected 4 outputs, got {}", outputs.len()),
            ));
        }

        // scores and boxes are split over two feature-map resolutions each
        let mut scores = tensor_values(&outputs[0])?;
        scores.extend(tensor_values(&outputs[1])?);

        let mut boxes = tensor_values(&outputs[2])?;
        boxes.extend(tensor_values(&outputs[3])?);

        Ok((scores, boxes))
    }
}

impl FaceDetector for BlazefaceDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Hog
    }

    fn detect(&self, frame: &GrayImage) -> Result<Vec<FaceDetection>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        // cut the centred square and scale it to the network input
        let crop = CropBox::centered(width, height);
        let square = imageops::crop_imm(frame, crop.x, crop.y, crop.side, crop.side).to_image();
        let square = imageops::resize(&square, INPUT_SIZE, INPUT_SIZE, FilterType::Nearest);
        let input = DynamicImage::ImageLuma8(square).to_rgb8();

        let input: Vec<f32> = input
            .pixels()
            .flat_map(|p| p.0)
            .map(|p| p as f32 / 255.0)
            .collect();

        let (scores, boxes) = self.run_network(input)?;

        let detections: Vec<FaceDetection> =
            decode_detections(&scores, &boxes, &self.anchors, self.min_score)
                .into_iter()
                .map(|(score, b)| FaceDetection::scored(crop.to_frame(b), score as f64))
                .collect();

        let detections = non_max_suppression(detections, self.nms_threshold);
        debug!(faces = detections.len(), "blazeface detection");

        Ok(detections)
    }
}

fn tensor_values(value: &Value) -> Result<Vec<f32>> {
    let tensor: OrtOwnedTensor<f32, _> = value.try_extract()?;
    let values = tensor.view().iter().copied().collect();
    Ok(values)
}

/// Turns raw regressor output into normalised `[xmin, ymin, xmax, ymax]` boxes for
/// every anchor whose score clears `min_score`.
fn decode_detections(
    raw_scores: &[f32],
    raw_boxes: &[f32],
    anchors: &Array2<f32>,
    min_score: f32,
) -> Vec<(f32, [f32; 4])> {
    let scale = INPUT_SIZE as f32;
    let num_boxes = anchors
        .nrows()
        .min(raw_scores.len())
        .min(raw_boxes.len() / NUM_COORDS);

    let mut decoded = Vec::new();

    for i in 0..num_boxes {
        let score = sigmoid(raw_scores[i].clamp(-100.0, 100.0));
        if score < min_score {
            continue;
        }

        let raw = &raw_boxes[i * NUM_COORDS..i * NUM_COORDS + 4];
        let anchor = anchors.row(i);

        let x_center = raw[0] / scale * anchor[2] + anchor[0];
        let y_center = raw[1] / scale * anchor[3] + anchor[1];
        let w = raw[2] / scale * anchor[2];
        let h = raw[3] / scale * anchor[3];

        decoded.push((
            score,
            [
                x_center - w / 2.0,
                y_center - h / 2.0,
                x_center + w / 2.0,
                y_center + h / 2.0,
            ],
        ));
    }

    decoded
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
