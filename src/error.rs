use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Could not load {what}: {reason}")]
    ModelLoad { what: &'static str, reason: String },

    #[error("Inference error: {0}")]
    Inference(#[from] ort::OrtError),

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Transport error: {0}")]
    Transport(#[from] nng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No faces detected")]
    NoFaceDetected,

    #[error("Unable to detect landmarks")]
    LandmarksFailed,

    #[error("Viewer error: {0}")]
    Viewer(String),

    #[error("No frames found at {0}")]
    EmptySource(PathBuf),
}

impl Error {
    pub(crate) fn model_load(what: &'static str, reason: impl ToString) -> Self {
        Error::ModelLoad {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
