use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use ndarray::{Array, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, Session, SessionBuilder, Value};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::face::Landmarks;
use crate::face_landmarks::{
    certainty_from_presence, LandmarkModel, LandmarkParams, RESET_CERTAINTY,
};
use crate::geometry::Rect;

const INPUT_SIZE: u32 = 256;

/// Face mesh landmark engine (MediaPipe face_landmarks_detector, 478 points).
///
/// All instances created through [`MediapipeLandmarkModel::instance`] share one
/// inference session; the per-face state lives in each instance.
pub struct MediapipeLandmarkModel {
    session: Arc<Session>,
    state: FaceState,
}

/// Per-face tracking state of one engine instance.
#[derive(Debug, Clone, Default)]
struct FaceState {
    // square crop region around the tracked face, in frame pixels
    region: Option<Rect>,
    landmarks: Landmarks,
    presence: f64,
    // whether the most recent localisation succeeded
    last_ok: bool,
}

impl FaceState {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn fail(&mut self) {
        self.presence = 0.0;
        self.last_ok = false;
    }

    /// Takes a localisation result; it only counts when the face presence clears
    /// `min_presence`. A rejected result keeps the previous landmarks as the
    /// tracking seed but is not reported.
    fn record(&mut self, landmarks: Landmarks, presence: f64, min_presence: f64) -> bool {
        self.presence = presence;
        self.last_ok = presence >= min_presence;

        if self.last_ok {
            self.region = landmarks.bounding_box().map(|b| b.squared());
            self.landmarks = landmarks;
        }
        self.last_ok
    }

    fn certainty(&self) -> f64 {
        if self.last_ok && !self.landmarks.is_empty() {
            certainty_from_presence(self.presence)
        } else {
            RESET_CERTAINTY
        }
    }
}

impl MediapipeLandmarkModel {
    pub fn load(environment: &Arc<Environment>, model_path: impl AsRef<Path>) -> Result<Self> {
        let session = SessionBuilder::new(environment)
            .and_then(|builder| builder.with_intra_threads(1))
            .and_then(|builder| builder.with_model_from_file(model_path.as_ref()))
            .map_err(|e| Error::model_load("landmark model", e))?;

        Ok(Self::with_session(Arc::new(session)))
    }

    fn with_session(session: Arc<Session>) -> Self {
        Self {
            session,
            state: FaceState::default(),
        }
    }

    /// A new engine instance with empty state on the same session.
    pub fn instance(&self) -> Self {
        Self::with_session(Arc::clone(&self.session))
    }

    /// Runs the network on `crop` and returns landmarks in frame coordinates and
    /// the face presence probability.
    fn localise(&self, frame: &GrayImage, crop: &Rect) -> Result<(Landmarks, f64)> {
        let face = imageops::crop_imm(
            frame,
            crop.x as u32,
            crop.y as u32,
            crop.width.max(1.0) as u32,
            crop.height.max(1.0) as u32,
        )
        .to_image();
        let face = imageops::resize(&face, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let input = DynamicImage::ImageLuma8(face).to_rgb8();

        let input: Vec<f32> = input
            .pixels()
            .flat_map(|p| p.0)
            .map(|p| p as f32 / 255.0)
            .collect();

        let array: CowArray<_, _> =
            Array::from_shape_vec((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3), input)?
                .into_dyn()
                .into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;

        if outputs.len() < 2 {
            return Err(Error::model_load(
                "landmark model",
                format!("expected 2 outputs, got {}", outputs.len()),
            ));
        }

        let raw: OrtOwnedTensor<f32, _> = outputs[0].try_extract()?;
        let raw: Vec<f32> = raw.view().iter().copied().collect();

        let face_flag: OrtOwnedTensor<f32, _> = outputs[1].try_extract()?;
        let face_flag = face_flag.view().iter().next().copied().unwrap_or(f32::MIN);

        Ok((
            to_frame_landmarks(&raw, crop),
            sigmoid(face_flag as f64),
        ))
    }
}

impl LandmarkModel for MediapipeLandmarkModel {
    fn reset(&mut self) {
        self.state.reset();
    }

    fn detect_landmarks(
        &mut self,
        frame: &GrayImage,
        region: Option<&Rect>,
        params: &LandmarkParams,
    ) -> bool {
        // a detector seed gets the wide window, tracking re-crops around the last face
        let seed = match (region, self.state.region) {
            (Some(detected), _) => detected.squared().pad(params.init_padding),
            (None, Some(previous)) => previous.pad(params.track_padding),
            (None, None) => {
                self.state.fail();
                return false;
            }
        };

        let crop = match seed.clamp_to(frame.width(), frame.height()) {
            Some(crop) if crop.width >= 1.0 && crop.height >= 1.0 => crop,
            _ => {
                self.state.fail();
                return false;
            }
        };

        match self.localise(frame, &crop) {
            Ok((landmarks, presence)) => {
                trace!(presence, "landmark localisation");
                self.state.record(landmarks, presence, params.min_presence)
            }
            Err(e) => {
                warn!(error = %e, "landmark inference failed");
                self.state.fail();
                false
            }
        }
    }

    fn bounding_box(&self) -> Rect {
        self.state.landmarks.bounding_box().unwrap_or_default()
    }

    fn certainty(&self) -> f64 {
        self.state.certainty()
    }

    fn landmarks(&self) -> Landmarks {
        self.state.landmarks.clone()
    }
}

// network output is (x, y, z) triples in input pixels; z is dropped
fn to_frame_landmarks(raw: &[f32], crop: &Rect) -> Landmarks {
    let scale_x = crop.width / INPUT_SIZE as f64;
    let scale_y = crop.height / INPUT_SIZE as f64;

    let xy: Vec<f64> = raw
        .chunks_exact(3)
        .flat_map(|p| {
            [
                crop.x + p[0] as f64 * scale_x,
                crop.y + p[1] as f64 * scale_y,
            ]
        })
        .collect();

    Landmarks::from_xy(&xy)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn square(x: f64) -> Landmarks {
        Landmarks::from_xy(&[x, 10.0, x + 20.0, 30.0])
    }

    #[test]
    fn landmarks_are_mapped_into_the_crop() {
        let crop = Rect::new(100.0, 50.0, 512.0, 256.0);
        let raw = [0.0, 0.0, 3.0, 128.0, 256.0, -1.0];

        let points: Vec<Point2<f64>> = to_frame_landmarks(&raw, &crop).iter().collect();
        assert_eq!(
            points,
            vec![Point2::new(100.0, 50.0), Point2::new(356.0, 306.0)]
        );
    }

    #[test]
    fn sigmoid_is_centred() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(8.0) > 0.99);
    }

    #[test]
    fn accepted_localisation_is_reported() {
        let mut state = FaceState::default();
        assert_eq!(state.certainty(), RESET_CERTAINTY);

        assert!(state.record(square(0.0), 0.95, 0.5));
        assert!((state.certainty() - -0.9).abs() < 1e-12);
        assert_eq!(state.region, Some(Rect::new(0.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn rejected_localisation_is_not_reported_with_old_landmarks() {
        let mut state = FaceState::default();
        assert!(state.record(square(0.0), 0.95, 0.9));

        // presence 0.8 maps to -0.6, but it is below min_presence
        assert!(!state.record(square(50.0), 0.8, 0.9));
        assert_eq!(state.certainty(), RESET_CERTAINTY);
        // tracking seed and landmarks stay on the last accepted face
        assert_eq!(state.region, Some(Rect::new(0.0, 10.0, 20.0, 20.0)));
        assert_eq!(state.landmarks, square(0.0));

        assert!(state.record(square(50.0), 0.85, 0.8));
        assert!(state.certainty() < -0.1);
    }

    #[test]
    fn inference_failure_hides_the_face() {
        let mut state = FaceState::default();
        assert!(state.record(square(0.0), 0.95, 0.5));

        state.fail();
        assert_eq!(state.certainty(), RESET_CERTAINTY);

        state.reset();
        assert!(state.landmarks.is_empty());
        assert_eq!(state.region, None);
    }
}
