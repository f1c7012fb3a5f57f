use nalgebra::{Matrix2xX, Point2};
use serde::{Serialize, Serializer};

use crate::geometry::Rect;

// landmark positions of one face, one column per point (row 0 = x, row 1 = y)
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    pub points: Matrix2xX<f64>,
}

impl Landmarks {
    pub fn empty() -> Self {
        Self {
            points: Matrix2xX::zeros(0),
        }
    }

    // construct from interleaved (x, y) pairs
    pub fn from_xy(xy: &[f64]) -> Self {
        let n = xy.len() / 2;
        Self {
            points: Matrix2xX::from_column_slice(&xy[..n * 2]),
        }
    }

    pub fn len(&self) -> usize {
        self.points.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.points.ncols() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        self.points
            .column_iter()
            .map(|c| Point2::new(c[0], c[1]))
    }

    /// Tight box around all points.
    pub fn bounding_box(&self) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }

        let mut x_min = f64::MAX;
        let mut y_min = f64::MAX;
        let mut x_max = f64::MIN;
        let mut y_max = f64::MIN;

        for p in self.iter() {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }

        Some(Rect::from_corners(x_min, y_min, x_max, y_max))
    }
}

impl Default for Landmarks {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Landmarks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|p| [p.x, p.y]))
    }
}

/// One reported face: the slot it came from, its box and landmarks.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedFace {
    pub slot: usize,
    pub bbox: Rect,
    pub certainty: f64,
    pub landmarks: Landmarks,
}
