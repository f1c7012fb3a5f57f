pub mod model_mediapipe;

use image::GrayImage;

use crate::error::{Error, Result};
use crate::face::Landmarks;
use crate::geometry::Rect;

/// Certainty reported by an engine that holds no face (least certain).
pub const RESET_CERTAINTY: f64 = 1.0;

/// Tuning shared by every engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkParams {
    /// Padding (fraction of the box width) around a detector region on first localisation
    pub init_padding: f64,
    /// Padding around the previous bounding box while tracking
    pub track_padding: f64,
    /// Face presence needed for a localisation to count as a success
    pub min_presence: f64,
}

impl Default for LandmarkParams {
    fn default() -> Self {
        Self {
            init_padding: 0.5,
            track_padding: 0.25,
            min_presence: 0.5,
        }
    }
}

impl LandmarkParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.init_padding >= 0.0 && self.track_padding >= 0.0) {
            return Err(Error::Config("landmark padding must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.min_presence) {
            return Err(Error::Config(format!(
                "min presence {} outside [0, 1]",
                self.min_presence
            )));
        }
        Ok(())
    }
}

/// One instance of the landmark tracking engine, exclusively owned by a tracking slot.
///
/// Certainty follows the engine's convention: a value in `[-1, 1]` where lower means
/// more certain. A freshly reset model reports [`RESET_CERTAINTY`].
pub trait LandmarkModel: Send {
    /// Forget the tracked face.
    fn reset(&mut self);

    /// Localise landmarks in `frame`.
    ///
    /// With a `region` the model starts from that detector box using a wide search
    /// window; without one it continues from its own state. Returns whether the
    /// localisation succeeded.
    fn detect_landmarks(
        &mut self,
        frame: &GrayImage,
        region: Option<&Rect>,
        params: &LandmarkParams,
    ) -> bool;

    fn bounding_box(&self) -> Rect;

    fn certainty(&self) -> f64;

    fn landmarks(&self) -> Landmarks;
}

/// Maps a face presence probability onto the engine certainty scale.
pub fn certainty_from_presence(presence: f64) -> f64 {
    (1.0 - 2.0 * presence).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_maps_to_lower_is_better() {
        assert_eq!(certainty_from_presence(1.0), -1.0);
        assert_eq!(certainty_from_presence(0.0), 1.0);
        assert_eq!(certainty_from_presence(0.5), 0.0);
        assert!(certainty_from_presence(0.9) < certainty_from_presence(0.6));
    }

    #[test]
    fn params_validation() {
        assert!(LandmarkParams::default().validate().is_ok());

        let params = LandmarkParams {
            min_presence: 1.5,
            ..LandmarkParams::default()
        };
        assert!(params.validate().is_err());

        let params = LandmarkParams {
            track_padding: -0.1,
            ..LandmarkParams::default()
        };
        assert!(params.validate().is_err());
    }
}
