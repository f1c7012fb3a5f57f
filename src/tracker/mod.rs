//! Multi-face tracking: a fixed pool of landmark engines, fed by a periodic
//! full-frame detector and updated in parallel every frame.

pub mod candidates;
pub mod output;
pub mod slot;

use image::GrayImage;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::face_detection::FaceDetector;
use crate::face_landmarks::LandmarkModel;
use crate::frame_source::{CameraIntrinsics, Frame, FrameContext, FrameSource};
use crate::utils::{FpsTracker, FPS_WINDOW};

pub use candidates::{should_detect, suppress_overlapping, DetectionCandidate};
pub use output::{aggregate, FrameResult};
pub use slot::{SlotPool, SlotReport, SlotUpdate, TrackingSlot};

pub struct Tracker {
    config: TrackerConfig,
    detector: Box<dyn FaceDetector>,
    pool: SlotPool,
    workers: ThreadPool,
    intrinsics: Option<CameraIntrinsics>,
    fps: FpsTracker,
    frames_processed: u64,
}

impl Tracker {
    /// Sets up a tracking session with one slot per engine in `models`.
    ///
    /// Fails when the configuration is invalid or the number of engines does not
    /// match `num_faces_max`; nothing is tracked until this succeeds.
    pub fn new(
        config: TrackerConfig,
        detector: Box<dyn FaceDetector>,
        models: Vec<Box<dyn LandmarkModel>>,
    ) -> Result<Self> {
        config.validate()?;

        if models.len() != config.num_faces_max {
            return Err(Error::Config(format!(
                "expected {} landmark models, got {}",
                config.num_faces_max,
                models.len()
            )));
        }

        if detector.kind() != config.detector {
            warn!(
                configured = %config.detector,
                actual = %detector.kind(),
                "detector does not match the configured kind"
            );
        }

        let pool = SlotPool::from_models(models)?;

        let workers = ThreadPoolBuilder::new()
            .num_threads(pool.capacity())
            .thread_name(|i| format!("slot-worker-{}", i))
            .build()?;

        info!(
            num_faces_max = pool.capacity(),
            detector = %detector.kind(),
            detection_interval = config.detection_interval,
            "tracker ready"
        );

        Ok(Self {
            config,
            detector,
            pool,
            workers,
            intrinsics: None,
            fps: FpsTracker::default(),
            frames_processed: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Camera parameters, known once the first frame has been tracked.
    pub fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.intrinsics
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Tracks faces in one frame.
    pub fn track(&mut self, frame: &Frame) -> FrameResult {
        let intrinsics = self.resolve_intrinsics(frame);
        let context = FrameContext::new(frame, &intrinsics);
        self.process(&context)
    }

    // resolved from the first frame and kept for the rest of the session
    fn resolve_intrinsics(&mut self, frame: &Frame) -> CameraIntrinsics {
        let (width, height) = frame.dimensions();
        let camera = &self.config.camera;
        *self
            .intrinsics
            .get_or_insert_with(|| CameraIntrinsics::resolve(camera, width, height))
    }

    /// Runs the per-frame pipeline: detect, suppress, update every slot, aggregate.
    pub fn process(&mut self, context: &FrameContext<'_>) -> FrameResult {
        let candidates = self.detect_candidates(context.frame_index, context.grayscale_frame);
        let reports = self.update_slots(context.grayscale_frame, &candidates);

        for report in &reports {
            if report.reclaimed {
                debug!(slot = report.slot, "slot exceeded failure bound");
            }
            match report.update {
                SlotUpdate::Claimed {
                    candidate,
                    activated: true,
                } => info!(slot = report.slot, candidate, "slot started tracking a face"),
                SlotUpdate::Claimed {
                    candidate,
                    activated: false,
                } => debug!(slot = report.slot, candidate, "slot failed to initialise"),
                _ => {}
            }
        }

        let faces = aggregate(&self.pool, self.config.visualisation_boundary);
        let active_slots = self.pool.num_active();

        let fps = self.fps.tick();
        self.frames_processed += 1;
        if self.frames_processed % FPS_WINDOW == 0 {
            info!(
                frame = context.frame_index,
                fps = fps.unwrap_or_default(),
                active_slots,
                faces = faces.len(),
                "tracking"
            );
        }

        FrameResult {
            frame_index: context.frame_index,
            found: !faces.is_empty(),
            active_slots,
            fps,
            intrinsics: *context.camera_intrinsics,
            faces,
        }
    }

    /// Tracks every frame of `source` until it runs dry, handing each frame and its
    /// result to `on_frame`. Returns the number of frames processed.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<u64>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&FrameContext<'_>, &FrameResult) -> Result<()>,
    {
        info!("starting tracking");
        let mut frames = 0;

        while let Some(frame) = source.next_frame()? {
            let intrinsics = self.resolve_intrinsics(&frame);
            let context = FrameContext::new(&frame, &intrinsics);
            let result = self.process(&context);
            on_frame(&context, &result)?;
            frames += 1;
        }

        info!(frames, "end of stream");
        Ok(frames)
    }

    fn detect_candidates(&self, frame_index: u64, frame: &GrayImage) -> Vec<DetectionCandidate> {
        if !should_detect(
            frame_index,
            self.config.detection_interval,
            self.pool.all_active(),
        ) {
            return Vec::new();
        }

        let detections = match self.detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(error = %e, frame = frame_index, "face detection failed");
                Vec::new()
            }
        };

        let mut candidates: Vec<DetectionCandidate> =
            detections.into_iter().map(DetectionCandidate::from).collect();

        let detected = candidates.len();
        let suppressed = suppress_overlapping(
            &mut candidates,
            &self.pool.active_boxes(),
            self.config.overlap_threshold,
        );

        debug!(
            frame = frame_index,
            detected, suppressed, "detection cycle"
        );

        candidates
    }

    // Every slot gets its own state plus shared read access to the candidates; the
    // claim flags are the only thing written concurrently.
    fn update_slots(
        &mut self,
        frame: &GrayImage,
        candidates: &[DetectionCandidate],
    ) -> Vec<SlotReport> {
        let params = self.config.landmarks;
        let max_failures = self.config.max_failures_in_a_row;
        let slots = self.pool.slots_mut();

        self.workers.install(|| {
            slots
                .par_iter_mut()
                .enumerate()
                .map(|(index, slot)| slot.update(index, frame, candidates, &params, max_failures))
                .collect()
        })
    }
}
