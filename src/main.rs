use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Args, Parser, Subcommand};
use ort::Environment;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use multiface::app::{panic_message, run_viewer, spawn_worker};
use multiface::bridge::{self, Publisher};
use multiface::config::{CameraConfig, TrackerConfig, DEFAULT_NUM_FACES_MAX, DEFAULT_VISUALISATION_BOUNDARY};
use multiface::face_detection::model_blazeface::BlazefaceDetector;
use multiface::face_detection::model_cascade::CascadeDetector;
use multiface::face_detection::{DetectorKind, FaceDetector};
use multiface::face_landmarks::model_mediapipe::MediapipeLandmarkModel;
use multiface::face_landmarks::{LandmarkModel, LandmarkParams};
use multiface::frame_source::{FrameSource, ImageSequence};
use multiface::overlay::annotate;
use multiface::single::SingleFaceAnalyzer;
use multiface::utils::{onnx_environment, SharedState, State};
use multiface::{Result, Tracker};

#[derive(Parser)]
#[command(name = "multiface", version, about = "Track several faces at once")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track faces over an image or a directory of frames
    Track {
        /// Image file or directory of frames
        input: PathBuf,
        /// Write annotated frames here
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Publish every frame's result on this nng address
        #[arg(long)]
        publish: Option<String>,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Answer encoded images sent over nng request/reply with tracking results
    Serve {
        #[arg(long, default_value = "tcp://127.0.0.1:54321")]
        address: String,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    /// Find the largest face and its landmarks in one image
    Detect {
        image: PathBuf,
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Track frames and show the result in a window
    View {
        input: PathBuf,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
}

#[derive(Args, Clone)]
struct ModelArgs {
    #[arg(long, default_value = "hog")]
    detector: DetectorKind,
    /// ONNX detector model (hog) or SeetaFace cascade (haar)
    #[arg(long, default_value = "models/face_detection_back_256x256.onnx")]
    detector_model: PathBuf,
    /// Anchor table for the ONNX detector
    #[arg(long, default_value = "models/anchors.npy")]
    anchors: PathBuf,
    #[arg(long, default_value = "models/face_landmarks_detector.onnx")]
    landmark_model: PathBuf,
    /// Drop ONNX detections scoring below this
    #[arg(long)]
    min_score: Option<f32>,
    /// Landmark fits with a lower face presence count as failures
    #[arg(long)]
    min_presence: Option<f64>,
}

#[derive(Args, Clone)]
struct TrackingArgs {
    /// Maximum number of faces tracked at once
    #[arg(long, default_value_t = DEFAULT_NUM_FACES_MAX)]
    num_faces: usize,
    /// Faces are reported when their certainty is below this value
    #[arg(long, default_value_t = DEFAULT_VISUALISATION_BOUNDARY, allow_hyphen_values = true)]
    visualisation_boundary: f64,
    #[arg(long)]
    fx: Option<f64>,
    #[arg(long)]
    fy: Option<f64>,
    #[arg(long)]
    cx: Option<f64>,
    #[arg(long)]
    cy: Option<f64>,
    #[command(flatten)]
    models: ModelArgs,
}

impl TrackingArgs {
    fn config(&self) -> TrackerConfig {
        let mut config = TrackerConfig::default()
            .with_num_faces_max(self.num_faces)
            .with_visualisation_boundary(self.visualisation_boundary);
        config.detector = self.models.detector;
        config.landmarks = self.models.landmark_params();
        config.camera = CameraConfig {
            fx: self.fx,
            fy: self.fy,
            cx: self.cx,
            cy: self.cy,
        };
        config
    }

    fn build_tracker(&self) -> Result<Tracker> {
        let config = self.config();
        config.validate()?;

        let environment = onnx_environment()?;
        let detector = self.models.detector(&environment)?;

        let template = MediapipeLandmarkModel::load(&environment, &self.models.landmark_model)?;
        let models: Vec<Box<dyn LandmarkModel>> = (0..config.num_faces_max)
            .map(|_| Box::new(template.instance()) as Box<dyn LandmarkModel>)
            .collect();

        Tracker::new(config, detector, models)
    }
}

impl ModelArgs {
    fn detector(&self, environment: &Arc<Environment>) -> Result<Box<dyn FaceDetector>> {
        Ok(match self.detector {
            DetectorKind::Hog => {
                let mut detector =
                    BlazefaceDetector::load(environment, &self.detector_model, &self.anchors)?;
                if let Some(min_score) = self.min_score {
                    detector = detector.with_min_score(min_score);
                }
                Box::new(detector)
            }
            DetectorKind::Haar => Box::new(CascadeDetector::load(&self.detector_model)?),
        })
    }

    fn landmark_params(&self) -> LandmarkParams {
        let mut params = LandmarkParams::default();
        if let Some(min_presence) = self.min_presence {
            params.min_presence = min_presence;
        }
        params
    }
}

fn track(
    input: PathBuf,
    output_dir: Option<PathBuf>,
    publish: Option<String>,
    tracking: TrackingArgs,
) -> Result<()> {
    let mut tracker = tracking.build_tracker()?;
    let mut source = ImageSequence::open(&input)?;
    let publisher = publish.as_deref().map(Publisher::bind).transpose()?;

    if let Some(dir) = &output_dir {
        fs::create_dir_all(dir)?;
    }
    let boundary = tracker.config().visualisation_boundary;

    tracker.run(&mut source, |context, result| {
        println!("{}", result.to_json()?);

        if let Some(publisher) = &publisher {
            publisher.publish(result)?;
        }
        if let Some(dir) = &output_dir {
            let path = dir.join(format!("frame_{:06}.png", context.frame_index));
            annotate(context.raw_frame, result, boundary).save(&path)?;
        }
        Ok(())
    })?;

    Ok(())
}

fn detect(image: PathBuf, models: ModelArgs) -> Result<()> {
    let environment = onnx_environment()?;
    let detector = models.detector(&environment)?;
    let model = MediapipeLandmarkModel::load(&environment, &models.landmark_model)?;

    let gray = image::open(&image)?.to_luma8();
    let params = models.landmark_params();
    params.validate()?;
    let mut analyzer =
        SingleFaceAnalyzer::new(detector, Box::new(model)).with_params(params);
    let analysis = analyzer.analyze(&gray)?;

    println!("{}", serde_json::to_string(&analysis)?);
    Ok(())
}

fn view(input: PathBuf, tracking: TrackingArgs) -> Result<()> {
    let shared_state: SharedState = Arc::new(Mutex::new(State::default()));

    let worker = spawn_worker(Arc::clone(&shared_state), move || {
        let tracker = tracking.build_tracker()?;
        let source: Box<dyn FrameSource> = Box::new(ImageSequence::open(&input)?);
        Ok((tracker, source))
    });

    let viewer = run_viewer(Arc::clone(&shared_state));

    if let Ok(mut state) = shared_state.lock() {
        state.stop_requested = true;
    }
    if let Err(payload) = worker.join() {
        error!(panic = %panic_message(payload.as_ref()), "tracking worker panicked");
    }
    viewer
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("multiface=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Track {
            input,
            output_dir,
            publish,
            tracking,
        } => track(input, output_dir, publish, tracking),
        Command::Serve { address, tracking } => {
            let mut tracker = tracking.build_tracker()?;
            let frames = bridge::serve(&address, &mut tracker)?;
            info!(frames, "done");
            Ok(())
        }
        Command::Detect { image, models } => detect(image, models),
        Command::View { input, tracking } => view(input, tracking),
    }
}
