//! Main viewer application

use std::path::PathBuf;

use egui::{CentralPanel, Color32, RichText, SidePanel, TopBottomPanel};

use super::export;
use super::settings::Settings;
use super::viewport::Viewport;
use crate::geom::{GeometryBuffer, ReceiverKind, Scene};
use crate::pipeline::{RenderConfig, ShadowMode};

/// Surface files the object loader understands
const SURFACE_EXTENSIONS: &[&str] = &["obj", "surf", "txt"];

pub struct ShadowApp {
    viewport: Viewport,
    settings: Settings,
    scene: Scene,
    current_mesh: Option<PathBuf>,
    status_message: String,
    _trace_guard: Option<tracing_chrome::FlushGuard>,
}

impl ShadowApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: Settings,
        initial_mesh: Option<PathBuf>,
        trace_guard: Option<tracing_chrome::FlushGuard>,
    ) -> Self {
        let config = RenderConfig {
            seed: settings.seed,
            dump_dir: settings.dump_dir.clone(),
            ..Default::default()
        };
        let mut viewport = Viewport::new(config, settings.shadow_mode);

        let mut status_message = "Ready".to_string();
        if let Some(render_state) = cc.wgpu_render_state.as_ref() {
            if let Err(err) = viewport.init_pipeline(render_state) {
                log::error!("Failed to build the shadow pipeline: {}", err);
                status_message = format!("GPU setup failed: {}", err);
            }
        }

        let mut app = Self {
            viewport,
            settings,
            scene: Scene::new(GeometryBuffer::default(), Scene::build_receiver(ReceiverKind::default())),
            current_mesh: None,
            status_message,
            _trace_guard: trace_guard,
        };

        // Use last mesh if none given on the command line
        let mesh = initial_mesh.or_else(|| app.settings.last_mesh.clone());
        app.load_scene(mesh);
        app
    }

    /// Load the object (unit cube when `path` is `None`) with the current receiver
    fn load_scene(&mut self, path: Option<PathBuf>) {
        let _span = tracing::info_span!("load_scene").entered();
        match Scene::load(path.as_deref(), self.settings.receiver) {
            Ok(scene) => {
                self.scene = scene;
                self.status_message = match &path {
                    Some(p) => format!(
                        "Loaded {} ({} triangles)",
                        p.display(),
                        self.scene.object.triangle_count()
                    ),
                    None => "Default cube".to_string(),
                };
                self.settings.last_mesh = path.clone();
                self.current_mesh = path;
            }
            Err(err) => {
                log::error!("Failed to load scene: {}", err);
                self.status_message = format!("Error: {}", err);
                if let Ok(scene) = Scene::load(None, self.settings.receiver) {
                    self.scene = scene;
                }
                self.current_mesh = None;
            }
        }
        self.viewport.reset_cache();
    }

    fn open_mesh_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Surface", SURFACE_EXTENSIONS)
            .pick_file()
        {
            self.load_scene(Some(path));
        }
    }

    fn save_image_dialog(&mut self) {
        let mode = self.viewport.mode();
        let Some(path) = export::pick_save_path(mode, self.settings.last_save_dir.as_deref()) else {
            return;
        };
        let Some(pipeline) = self.viewport.pipeline_mut() else {
            self.status_message = "Nothing rendered yet".into();
            return;
        };

        match export::save_last_frame(pipeline, &path) {
            Ok(()) => {
                self.status_message = format!("Saved {}", path.display());
                self.settings.last_save_dir = path.parent().map(|p| p.to_path_buf());
            }
            Err(err) => {
                log::error!("{:#}", err);
                self.status_message = format!("Save failed: {:#}", err);
            }
        }
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Shadows");
        let mut mode = self.viewport.mode();
        for candidate in ShadowMode::ALL {
            ui.radio_value(&mut mode, candidate, candidate.label());
        }
        if mode != self.viewport.mode() {
            self.viewport.set_mode(mode);
            self.settings.shadow_mode = mode;
        }

        ui.separator();
        ui.heading("Receiver");
        let mut receiver = self.settings.receiver;
        ui.radio_value(&mut receiver, ReceiverKind::ColorBox, "Color box");
        ui.radio_value(&mut receiver, ReceiverKind::CheckerFloor, "Checker floor");
        if receiver != self.settings.receiver {
            self.settings.receiver = receiver;
            self.scene.receiver = Scene::build_receiver(receiver);
            self.viewport.reset_cache();
        }

        ui.separator();
        ui.heading("Object");
        let name = self
            .current_mesh
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cube".into());
        ui.label(format!("{} ({} triangles)", name, self.scene.object.triangle_count()));
        ui.horizontal(|ui| {
            if ui.button("Open...").clicked() {
                self.open_mesh_dialog();
            }
            if ui.button("Cube").clicked() {
                self.load_scene(None);
            }
        });

        ui.separator();
        if ui.button("Save image...").clicked() {
            self.save_image_dialog();
        }
        if ui.button("Reset cache").clicked() {
            self.viewport.reset_cache();
            self.status_message = "Cache cleared".into();
        }
        if ui.button("Reset camera").clicked() {
            self.viewport.arcball.reset();
        }

        if let Some(pipeline) = self.viewport.pipeline_mut() {
            if let Some(vpls) = pipeline.vpls() {
                ui.separator();
                ui.label(format!("{} VPLs", vpls.len()));
            }
        }

        if let Some(err) = self.viewport.error() {
            ui.separator();
            ui.label(RichText::new(err).color(Color32::LIGHT_RED));
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(&self.status_message);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("FPS: {:.0}", ui.ctx().input(|i| 1.0 / i.stable_dt)));
            });
        });
    }
}

impl eframe::App for ShadowApp {
    fn on_exit(&mut self) {
        self.settings.save();
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        let response = SidePanel::right("side_panel")
            .default_width(self.settings.side_panel_width)
            .min_width(150.0)
            .max_width(400.0)
            .resizable(true)
            .show(ctx, |ui| {
                self.side_panel(ui);
            });
        self.settings.side_panel_width = response.response.rect.width();

        CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let render_state = frame.wgpu_render_state();
                self.viewport.show(ui, render_state, &self.scene);
            });

        // Track window size and position for saving on exit
        ctx.input(|i| {
            if let Some(rect) = i.viewport().inner_rect {
                self.settings.window_width = rect.width();
                self.settings.window_height = rect.height();
            }
            if let Some(pos) = i.viewport().outer_rect {
                self.settings.window_x = Some(pos.min.x);
                self.settings.window_y = Some(pos.min.y);
            }
        });
    }
}
