//! 3D viewport widget: arcball input, shadow pipeline and texture display.

use egui::{Response, Sense, Ui, Vec2};

use super::renderer::Renderer;
use crate::camera::{ArcballController, PointerButton, ViewportSize};
use crate::geom::Scene;
use crate::pipeline::{RenderConfig, ShadowMode, ShadowPipeline};
use crate::util::{Result, Vec2 as PixelPos};

/// Viewport state
pub struct Viewport {
    pub arcball: ArcballController,
    config: RenderConfig,
    mode: ShadowMode,
    pipeline: Option<ShadowPipeline<Renderer>>,
    /// egui handle of the composited frame and the target generation it wraps
    texture: Option<(egui::TextureId, u64)>,
    /// Set when a frame fails; rendering pauses until the cache is reset
    error: Option<String>,
}

impl Viewport {
    pub fn new(config: RenderConfig, mode: ShadowMode) -> Self {
        let arcball = ArcballController::new(config.camera, ViewportSize::new(1, 1));
        Self {
            arcball,
            config,
            mode,
            pipeline: None,
            texture: None,
            error: None,
        }
    }

    /// Build the GPU pipeline on the device egui renders with
    pub fn init_pipeline(&mut self, render_state: &egui_wgpu::RenderState) -> Result<()> {
        let renderer = Renderer::new(&render_state.device, &render_state.queue)?;
        let mut pipeline = ShadowPipeline::new(renderer, self.config.clone())?;
        pipeline.set_mode(self.mode);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut ShadowPipeline<Renderer>> {
        self.pipeline.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mode(&self) -> ShadowMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ShadowMode) {
        self.mode = mode;
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.set_mode(mode);
        }
    }

    /// Drop cached light stages, VPLs and irradiance
    pub fn reset_cache(&mut self) {
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.invalidate();
        }
        self.error = None;
    }

    /// Show viewport UI and handle input
    pub fn show(
        &mut self,
        ui: &mut Ui,
        render_state: Option<&egui_wgpu::RenderState>,
        scene: &Scene,
    ) -> Response {
        let _span = tracing::info_span!("viewport_show").entered();
        let available = ui.available_size();
        let size = Vec2::new(available.x.max(64.0), available.y.max(64.0));
        let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());

        let pixels_per_point = ui.ctx().pixels_per_point();
        let pixels = ViewportSize::new(
            (size.x * pixels_per_point).round() as u32,
            (size.y * pixels_per_point).round() as u32,
        );
        self.arcball.resize(pixels);
        self.handle_input(ui, &response, pixels_per_point);

        match render_state {
            Some(render_state) if self.error.is_none() => {
                if let Err(err) = self.render(render_state, scene, pixels) {
                    log::error!("Frame failed: {}", err);
                    self.error = Some(err.to_string());
                }
            }
            Some(_) => {}
            None => {
                ui.painter().rect_filled(rect, 0.0, egui::Color32::from_rgb(30, 30, 35));
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Initializing...",
                    egui::FontId::default(),
                    egui::Color32::GRAY,
                );
                return response;
            }
        }

        if let Some((texture_id, _)) = self.texture {
            ui.painter().image(
                texture_id,
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        response
    }

    fn render(
        &mut self,
        render_state: &egui_wgpu::RenderState,
        scene: &Scene,
        size: ViewportSize,
    ) -> Result<()> {
        if self.pipeline.is_none() {
            self.init_pipeline(render_state)?;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(());
        };

        let transforms = self.arcball.transforms();
        let frame = pipeline.render_frame(scene, &transforms, size)?;

        // The composite target is reused while the size holds; only a new
        // texture needs a new egui registration.
        let registered = self.texture.map(|(_, generation)| generation);
        if registered != Some(frame.generation) {
            let mut egui_renderer = render_state.renderer.write();
            if let Some((old_id, _)) = self.texture.take() {
                egui_renderer.free_texture(&old_id);
            }
            let texture_id = egui_renderer.register_native_texture(
                &render_state.device,
                &frame.view,
                wgpu::FilterMode::Linear,
            );
            self.texture = Some((texture_id, frame.generation));
        }
        Ok(())
    }

    fn handle_input(&mut self, ui: &Ui, response: &Response, pixels_per_point: f32) {
        let to_pixels = |pos: egui::Pos2| {
            let local = pos - response.rect.min;
            PixelPos::new(local.x * pixels_per_point, local.y * pixels_per_point)
        };

        let pressed = [
            (egui::PointerButton::Primary, PointerButton::Primary),
            (egui::PointerButton::Secondary, PointerButton::Secondary),
            (egui::PointerButton::Middle, PointerButton::Tertiary),
        ]
        .into_iter()
        .find(|(button, _)| response.drag_started_by(*button));

        if let (Some((_, button)), Some(pos)) = (pressed, response.interact_pointer_pos()) {
            self.arcball.begin_drag(to_pixels(pos), button);
        } else if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.arcball.drag(to_pixels(pos));
            }
        }
        if response.drag_stopped() {
            self.arcball.end_drag();
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll.abs() > 0.0 {
                self.arcball.scroll(scroll * pixels_per_point);
            }
        }

        if response.hovered() && ui.input(|i| i.key_pressed(egui::Key::Home)) {
            self.arcball.reset();
        }
    }
}
