use std::any::Any;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use egui::plot::{Line, Plot, PlotPoints};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::frame_source::{Frame, FrameSource};
use crate::overlay::annotate;
use crate::tracker::{FrameResult, Tracker};
use crate::utils::*;

const FPS_HISTORY: usize = 200;

/// Desktop window showing the annotated frames of a tracking session.
pub struct TrackingApp {
    shared_state: SharedState,
    texture: Option<egui::TextureHandle>,
    shown_frame: Option<u64>,
}

impl TrackingApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, shared_state: SharedState) -> Self {
        Self {
            shared_state,
            texture: None,
            shown_frame: None,
        }
    }
}

impl eframe::App for TrackingApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        frame.close();
                    }
                });
            });
        });

        let Ok(mut state) = self.shared_state.lock() else {
            return;
        };

        egui::SidePanel::left("side_panel").show(ctx, |ui| {
            let resolution = state.resolution.unwrap_or((0, 0));

            ui.label(format!("FPS: {:.1}", state.fps.unwrap_or(0.0)));
            ui.label(format!("Resolution: {}x{}", resolution.0, resolution.1));
            ui.label(format!("Frame: {}", state.frame_index));
            ui.label(format!(
                "Active slots: {}/{}",
                state.active_slots, state.num_faces_max
            ));
            ui.label(format!("Faces: {}", state.faces_found));

            if let Some(history) = &state.fps_history {
                if let Some(mean) = history.mean() {
                    ui.label(format!("Mean FPS: {:.1}", mean));
                }
                Plot::new("fps_plot")
                    .height(120.0)
                    .allow_zoom(false)
                    .allow_drag(false)
                    .show(ui, |plot_ui| {
                        plot_ui.line(Line::new(PlotPoints::from(history.points())).name("fps"))
                    });
            }

            if state.finished {
                ui.separator();
                ui.label("End of stream");
            }
            if let Some(message) = &state.error {
                ui.separator();
                ui.colored_label(egui::Color32::RED, message);
            }
        });

        // upload the newest frame once
        if self.shown_frame != Some(state.frame_index) {
            if let Some(image) = state.image.take() {
                let image = image.to_rgb8();
                let size = [image.width() as usize, image.height() as usize];
                let color_image = egui::ColorImage::from_rgb(size, image.as_raw());
                self.texture =
                    Some(ctx.load_texture("frame", color_image, egui::TextureOptions::default()));
                self.shown_frame = Some(state.frame_index);
            }
        }
        drop(state);

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                let [w, h] = texture.size();
                let width = ui.available_width();
                let height = width / (w as f32 / h.max(1) as f32);
                ui.image(texture, egui::Vec2::new(width, height));
            }
            None => {
                ui.label("Waiting for frames...");
            }
        });

        ctx.request_repaint_after(Duration::from_millis(33));
    }
}

/// Runs a tracking session on a background thread, publishing every annotated
/// frame into `shared_state`.
///
/// `setup` builds the tracker and frame source on the worker thread itself, so
/// neither needs to be `Send`. The session ends at the end of the stream or once
/// `stop_requested` is set.
pub fn spawn_worker<F>(shared_state: SharedState, setup: F) -> JoinHandle<()>
where
    F: FnOnce() -> Result<(Tracker, Box<dyn FrameSource>)> + Send + 'static,
{
    thread::spawn(move || {
        let outcome = setup().and_then(|(mut tracker, mut source)| {
            track_until_stopped(&shared_state, &mut tracker, source.as_mut())
        });

        let Ok(mut state) = shared_state.lock() else {
            return;
        };
        state.finished = true;
        match outcome {
            Ok(frames) => info!(frames, "viewer session finished"),
            Err(e) => {
                error!(error = %e, "viewer session failed");
                state.error = Some(e.to_string());
            }
        }
    })
}

/// Tracks frames from `source` into `shared_state` until the stream runs dry or
/// the viewer asks to stop. Returns the number of frames tracked.
pub fn track_until_stopped(
    shared_state: &SharedState,
    tracker: &mut Tracker,
    source: &mut dyn FrameSource,
) -> Result<u64> {
    let boundary = tracker.config().visualisation_boundary;
    let num_faces_max = tracker.config().num_faces_max;
    let mut frames = 0;

    while !stop_requested(shared_state) {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        let result = tracker.track(&frame);
        let annotated = annotate(&frame.raw, &result, boundary);
        frames += 1;

        let Ok(mut state) = shared_state.lock() else {
            break;
        };
        publish(&mut state, &frame, &result, annotated, num_faces_max);
    }

    Ok(frames)
}

fn stop_requested(shared_state: &SharedState) -> bool {
    shared_state.lock().map_or(true, |state| state.stop_requested)
}

fn publish(
    state: &mut State,
    frame: &Frame,
    result: &FrameResult,
    annotated: image::RgbImage,
    num_faces_max: usize,
) {
    state.image = Some(image::DynamicImage::ImageRgb8(annotated));
    state.resolution = Some(frame.dimensions());
    state.frame_index = result.frame_index;
    state.active_slots = result.active_slots;
    state.num_faces_max = num_faces_max;
    state.faces_found = result.faces.len();
    state.fps = result.fps;
    if let Some(fps) = result.fps {
        state
            .fps_history
            .get_or_insert_with(|| TimeSeries::new(FPS_HISTORY))
            .push(fps);
    }
}

/// Text of a panic payload, for logging a worker that died.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Opens the viewer window; blocks until it is closed.
pub fn run_viewer(shared_state: SharedState) -> Result<()> {
    let options = eframe::NativeOptions {
        initial_window_size: Some(egui::vec2(1280.0, 800.0)),
        ..Default::default()
    };

    eframe::run_native(
        "multiface",
        options,
        Box::new(move |cc| Box::new(TrackingApp::new(cc, shared_state))),
    )
    .map_err(|e| Error::Viewer(e.to_string()))
}
