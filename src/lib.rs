pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod face;
pub mod face_detection;
pub mod face_landmarks;
pub mod frame_source;
pub mod geometry;
pub mod overlay;
pub mod single;
pub mod tracker;
pub mod utils;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use tracker::{FrameResult, Tracker};
