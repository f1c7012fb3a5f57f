use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::DynamicImage;
use ort::{Environment, ExecutionProvider};

use crate::error::Result;

/// Frames between two frame rate measurements.
pub const FPS_WINDOW: u64 = 10;

/// One ONNX runtime environment for all sessions of the process.
pub fn onnx_environment() -> Result<Arc<Environment>> {
    let environment = Environment::builder()
        .with_name("multiface")
        .with_execution_providers([ExecutionProvider::CPU(Default::default())])
        .build()?
        .into_arc();
    Ok(environment)
}

/// Frame rate measured over blocks of frames.
pub struct FpsTracker {
    window: u64,
    frames: u64,
    window_start: Option<Instant>,
    fps: Option<f64>,
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new(FPS_WINDOW)
    }
}

impl FpsTracker {
    pub fn new(window: u64) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            window_start: None,
            fps: None,
        }
    }

    /// Counts one frame. Returns the latest measurement, `None` until the first
    /// window has completed.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        if self.frames >= self.window {
            let elapsed = now.duration_since(start).as_secs_f64();
            if elapsed > 0.0 {
                self.fps = Some(self.frames as f64 / elapsed);
            }
            self.frames = 0;
            self.window_start = Some(now);
        }

        self.fps
    }
}

// make SharedState an alias for a Mutex protected struct State
pub type SharedState = Arc<Mutex<State>>;

/// What the tracking worker hands to the viewer.
#[derive(Default)]
pub struct State {
    pub fps: Option<f64>,
    pub fps_history: Option<TimeSeries>,
    pub resolution: Option<(u32, u32)>,
    pub image: Option<DynamicImage>,
    pub frame_index: u64,
    pub active_slots: usize,
    pub num_faces_max: usize,
    pub faces_found: usize,
    pub finished: bool,
    pub error: Option<String>,
    /// Set by the viewer once its window is closed
    pub stop_requested: bool,
}

#[derive(Clone)]
pub struct TimeSeries {
    data: VecDeque<f64>,
    max_length: usize,
}

impl TimeSeries {
    pub fn new(max_length: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(max_length),
            max_length,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.data.push_back(value);

        if self.data.len() > self.max_length {
            self.data.pop_front();
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `[index, value]` pairs, oldest first.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| [i as f64, *v])
            .collect()
    }
}
