use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as PixelRect;

use crate::face::TrackedFace;
use crate::tracker::FrameResult;

/// Box colour for a face: red for a barely reported face, blue for a certain one.
pub fn certainty_color(certainty: f64, visualisation_boundary: f64) -> Rgb<u8> {
    let certainty = certainty.clamp(-1.0, 1.0);
    let range = visualisation_boundary + 1.0;
    let c = if range > 0.0 {
        ((certainty + 1.0) / range).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Rgb([(c * 255.0) as u8, 0, ((1.0 - c) * 255.0) as u8])
}

/// Box line width scaled with the frame width.
pub fn line_thickness(frame_width: u32) -> u32 {
    ((2.0 * frame_width as f64) / 640.0).ceil().max(1.0) as u32
}

/// Draws every face's bounding box and landmarks onto `image`.
pub fn draw_faces(image: &mut RgbImage, faces: &[TrackedFace], visualisation_boundary: f64) {
    let thickness = line_thickness(image.width());

    for face in faces {
        let color = certainty_color(face.certainty, visualisation_boundary);

        for i in 0..thickness {
            let grow = i as f64;
            let width = (face.bbox.width + 2.0 * grow).round() as u32;
            let height = (face.bbox.height + 2.0 * grow).round() as u32;
            if width == 0 || height == 0 {
                continue;
            }
            let rect = PixelRect::at(
                (face.bbox.x - grow).round() as i32,
                (face.bbox.y - grow).round() as i32,
            )
            .of_size(width, height);
            draw_hollow_rect_mut(image, rect, color);
        }

        for point in face.landmarks.iter() {
            draw_cross_mut(image, color, point.x.round() as i32, point.y.round() as i32);
        }
    }
}

/// A copy of `frame` with the frame's results drawn on it.
pub fn annotate(frame: &DynamicImage, result: &FrameResult, visualisation_boundary: f64) -> RgbImage {
    let mut image = frame.to_rgb8();
    draw_faces(&mut image, &result.faces, visualisation_boundary);
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::Landmarks;
    use crate::geometry::Rect;

    #[test]
    fn colour_runs_from_blue_to_red() {
        assert_eq!(certainty_color(-1.0, -0.1), Rgb([0, 0, 255]));
        assert_eq!(certainty_color(-0.1, -0.1), Rgb([255, 0, 0]));
        // out-of-range certainties are clamped
        assert_eq!(certainty_color(-3.0, -0.1), Rgb([0, 0, 255]));

        let Rgb([r, _, b]) = certainty_color(-0.55, -0.1);
        assert!(r > 100 && b > 100);
    }

    #[test]
    fn thickness_follows_frame_width() {
        assert_eq!(line_thickness(640), 2);
        assert_eq!(line_thickness(1280), 4);
        assert_eq!(line_thickness(100), 1);
    }

    #[test]
    fn draws_box_and_landmarks() {
        let mut image = RgbImage::new(64, 64);
        let face = TrackedFace {
            slot: 0,
            bbox: Rect::new(10.0, 10.0, 20.0, 20.0),
            certainty: -1.0,
            landmarks: Landmarks::from_xy(&[50.0, 50.0]),
        };

        draw_faces(&mut image, &[face], -0.1);

        let blue = Rgb([0, 0, 255]);
        assert_eq!(*image.get_pixel(10, 10), blue);
        assert_eq!(*image.get_pixel(29, 15), blue);
        assert_eq!(*image.get_pixel(50, 50), blue);
        assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
    }
}
