//! Interactive viewer: arcball camera over the shadow pipeline on wgpu.

mod app;
pub mod export;
pub mod renderer;
mod settings;
mod viewport;

pub use renderer::Renderer;
pub use settings::Settings;

use std::path::PathBuf;

use anyhow::Result;

use crate::geom::ReceiverKind;
use crate::util::init_tracing;

/// Run the viewer with an optional object mesh.
///
/// `receiver` overrides the receiver remembered from the last session.
pub fn run(initial_mesh: Option<PathBuf>, receiver: Option<ReceiverKind>) -> Result<()> {
    let trace_guard = init_tracing();

    // Friendly panic handler for GPU errors
    std::panic::set_hook(Box::new(|info| {
        let msg = info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("Unknown error");

        if msg.contains("wgpu") || msg.contains("Buffer") || msg.contains("shader") {
            eprintln!("\n[GPU Error] {}", msg);
        } else {
            eprintln!("\n[Error] {}", msg);
        }
        if let Some(loc) = info.location() {
            eprintln!("  at {}:{}:{}", loc.file(), loc.line(), loc.column());
        }
    }));

    let mut settings = Settings::load();
    if let Some(receiver) = receiver {
        settings.receiver = receiver;
    }

    let options = eframe::NativeOptions {
        viewport: {
            let mut vp = egui::ViewportBuilder::default()
                .with_inner_size([settings.window_width, settings.window_height])
                .with_title("Shadow Maps");
            if let (Some(x), Some(y)) = (settings.window_x, settings.window_y) {
                vp = vp.with_position([x, y]);
            }
            vp
        },
        renderer: eframe::Renderer::Wgpu,
        wgpu_options: egui_wgpu::WgpuConfiguration {
            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                device_descriptor: std::sync::Arc::new(|adapter| {
                    let base_limits = if adapter.get_info().backend == wgpu::Backend::Gl {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    };
                    wgpu::DeviceDescriptor {
                        label: Some("shadowmaps device"),
                        required_limits: wgpu::Limits {
                            max_texture_dimension_2d: 8192,
                            ..base_limits
                        },
                        ..Default::default()
                    }
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "Shadow Maps",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::ShadowApp::new(
                cc,
                settings,
                initial_mesh,
                trace_guard,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}
