//! "Save image" glue: file dialog and frame readback.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::renderer::Renderer;
use crate::pipeline::{ShadowMode, ShadowPipeline};
use crate::target::save_image;

/// Suggested file name for a frame rendered in `mode`.
pub fn default_file_name(mode: ShadowMode) -> String {
    format!("shadowmaps_{}.png", mode.label().to_ascii_lowercase())
}

/// Ask for a PNG or JPEG destination, starting in `last_dir`.
pub fn pick_save_path(mode: ShadowMode, last_dir: Option<&Path>) -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new()
        .set_title("Save image")
        .add_filter("PNG", &["png"])
        .add_filter("JPEG", &["jpg", "jpeg"])
        .set_file_name(default_file_name(mode));
    if let Some(dir) = last_dir {
        dialog = dialog.set_directory(dir);
    }
    dialog.save_file()
}

/// Read back the last composited frame and write it to `path`.
pub fn save_last_frame(pipeline: &mut ShadowPipeline<Renderer>, path: &Path) -> Result<()> {
    let _span = tracing::info_span!("save_image").entered();
    let frame = pipeline
        .read_back_frame()
        .context("Failed to read back the frame")?;
    save_image(&frame, path).with_context(|| format!("Failed to save {}", path.display()))
}
