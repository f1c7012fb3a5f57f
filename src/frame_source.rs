use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A captured frame and its grayscale conversion.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub raw: DynamicImage,
    pub gray: GrayImage,
}

impl Frame {
    pub fn new(index: u64, raw: DynamicImage) -> Self {
        let gray = raw.to_luma8();
        Self { index, raw, gray }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }
}

/// Anything that delivers frames in order. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Frames read from a single image file or from every image in a directory,
/// in file name order. Files that fail to decode are logged and skipped.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    position: usize,
    frames_read: u64,
}

impl ImageSequence {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let paths = if path.is_dir() {
            let mut paths: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            paths.sort();
            paths
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        };

        if paths.is_empty() {
            return Err(Error::EmptySource(path.to_path_buf()));
        }

        info!(frames = paths.len(), source = %path.display(), "opened image sequence");

        Ok(Self {
            paths,
            position: 0,
            frames_read: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(path) = self.paths.get(self.position) {
            self.position += 1;

            debug!(path = %path.display(), "reading frame");
            match image::open(path) {
                Ok(raw) => {
                    let frame = Frame::new(self.frames_read, raw);
                    self.frames_read += 1;
                    return Ok(Some(frame));
                }
                Err(e) => warn!(error = %e, path = %path.display(), "skipping unreadable frame"),
            }
        }

        Ok(None)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pinhole camera parameters in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Fills in whatever the configuration leaves open from the frame size.
    ///
    /// The optical centre is taken as given only when both coordinates are set and
    /// non-zero; otherwise both fall back to the image centre. Missing or zero focal
    /// lengths are guessed from a 500px focal length at 640x480, scaled to the frame
    /// and averaged over both axes.
    pub fn resolve(config: &CameraConfig, width: u32, height: u32) -> Self {
        let (width, height) = (width as f64, height as f64);

        let (cx, cy) = match (defined(config.cx), defined(config.cy)) {
            (Some(cx), Some(cy)) => (cx, cy),
            _ => (width / 2.0, height / 2.0),
        };

        let (fx, fy) = match (defined(config.fx), defined(config.fy)) {
            (Some(fx), Some(fy)) => (fx, fy),
            (Some(f), None) | (None, Some(f)) => (f, f),
            (None, None) => {
                let f = (500.0 * width / 640.0 + 500.0 * height / 480.0) / 2.0;
                (f, f)
            }
        };

        Self { fx, fy, cx, cy }
    }
}

// zero stands for "not set"
fn defined(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

/// Everything the tracker knows about the frame it is processing.
pub struct FrameContext<'a> {
    pub frame_index: u64,
    pub raw_frame: &'a DynamicImage,
    pub grayscale_frame: &'a GrayImage,
    pub camera_intrinsics: &'a CameraIntrinsics,
}

impl<'a> FrameContext<'a> {
    pub fn new(frame: &'a Frame, camera_intrinsics: &'a CameraIntrinsics) -> Self {
        Self {
            frame_index: frame.index,
            raw_frame: &frame.raw,
            grayscale_frame: &frame.gray,
            camera_intrinsics,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.grayscale_frame.dimensions()
    }
}
