use serde::Serialize;

/// Axis-aligned rectangle in frame (pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    /// X coordinate of the top-left corner
    pub x: f64,
    /// Y coordinate of the top-left corner
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from its two corners.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs())
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Area, zero for degenerate rectangles.
    pub fn area(&self) -> f64 {
        if self.width <= 0.0 || self.height <= 0.0 {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Intersection of two rectangles, `None` when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        self.intersection(other).map_or(0.0, |r| r.area())
    }

    /// Overlap ratio used to decide whether a detection duplicates a tracked face:
    /// `intersection / (area_a + area_b - 2 * intersection)`.
    ///
    /// The denominator is the area covered by exactly one of the two rectangles, so
    /// identical rectangles give `+inf` and any containment pushes the ratio up fast.
    /// Rectangles that do not touch give 0.
    pub fn overlap_ratio(&self, other: &Rect) -> f64 {
        let intersection = self.intersection_area(other);
        if intersection <= 0.0 {
            return 0.0;
        }

        let exclusive = self.area() + other.area() - 2.0 * intersection;
        if exclusive <= 0.0 {
            return f64::INFINITY;
        }

        intersection / exclusive
    }

    /// Standard intersection over union.
    pub fn iou(&self, other: &Rect) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Grows the rectangle by `fraction` of its width on every side.
    pub fn pad(&self, fraction: f64) -> Rect {
        let padding = fraction * self.width;
        Rect::new(
            self.x - padding,
            self.y - padding,
            self.width + 2.0 * padding,
            self.height + 2.0 * padding,
        )
    }

    /// Square with the same centre and the longer side.
    pub fn squared(&self) -> Rect {
        let side = self.width.max(self.height);
        let (cx, cy) = self.center();
        Rect::new(cx - side / 2.0, cy - side / 2.0, side, side)
    }

    /// Clips the rectangle to a `width` x `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        Rect::new(0.0, 0.0, width as f64, height as f64).intersection(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_rects_have_zero_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);

        assert_eq!(a.intersection(&b), None);
        assert_eq!(a.overlap_ratio(&b), 0.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn overlap_ratio_of_half_shifted_squares() {
        // intersection 50, areas 100 each: 50 / (200 - 100)
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 0.0, 10.0, 10.0);

        assert!((a.overlap_ratio(&b) - 0.5).abs() < 1e-12);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn contained_rect_has_large_overlap() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inner = Rect::new(10.0, 10.0, 80.0, 80.0);

        // 6400 / (10000 + 6400 - 12800)
        let ratio = outer.overlap_ratio(&inner);
        assert!((ratio - 6400.0 / 3600.0).abs() < 1e-9);
        assert!(ratio > 0.5);
    }

    #[test]
    fn identical_rects_overlap_infinitely() {
        let a = Rect::new(3.0, 4.0, 50.0, 60.0);
        assert!(a.overlap_ratio(&a).is_infinite());
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pad_and_clamp() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0).pad(0.5);
        assert_eq!(r, Rect::new(0.0, 0.0, 40.0, 40.0));

        let clipped = Rect::new(-5.0, -5.0, 20.0, 20.0).clamp_to(10, 10).unwrap();
        assert_eq!(clipped, Rect::new(0.0, 0.0, 10.0, 10.0));

        assert_eq!(Rect::new(50.0, 50.0, 5.0, 5.0).clamp_to(10, 10), None);
    }

    #[test]
    fn from_corners_orders_coordinates() {
        let r = Rect::from_corners(30.0, 40.0, 10.0, 20.0);
        assert_eq!(r, Rect::new(10.0, 20.0, 20.0, 20.0));
        assert_eq!(r.center(), (20.0, 30.0));
    }
}
