//! Render configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, Projection, ViewportSize};
use crate::sampling::{Seed, KERNEL_SIZE};
use crate::target::AtlasLayout;
use crate::util::{Result, Vec3};

/// Where VPLs come from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum VplSource {
    /// Random texels of the light-space G-buffer.
    #[default]
    Rejection,
    /// Points on the caster triangles, proportional to area.
    SurfaceArea { max_area_per_sample: f32 },
}

/// Every tunable of the shadow pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    // Light
    pub light: Camera,
    pub light_map_size: u32,

    // Viewer camera
    pub camera: Camera,

    // VPLs
    pub vpl_count: usize,
    pub atlas_rows: u32,
    pub atlas_cols: u32,
    pub atlas_cell_size: u32,
    pub vpl_source: VplSource,
    pub max_rejection_attempts: usize,

    // Shading
    pub kernel_size: usize,
    /// Half-width of the cube that position targets encode.
    pub scene_extent: f32,
    pub indirect_strength: f32,

    pub dump_dir: Option<PathBuf>,
    pub seed: Seed,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            light: Camera::new(
                Vec3::new(2.0, 8.0, 10.0),
                Vec3::ZERO,
                Vec3::Y,
                Projection::Orthographic {
                    left: -10.0,
                    right: 10.0,
                    bottom: -10.0,
                    top: 10.0,
                    near: 0.0,
                    far: 25.0,
                },
            ),
            light_map_size: 1024,
            camera: Camera::new(
                Vec3::new(10.0, 10.0, 10.0),
                Vec3::ZERO,
                Vec3::Y,
                Projection::Perspective {
                    fov_y_degrees: 45.0,
                    near: 1.0,
                    far: 1000.0,
                },
            ),
            vpl_count: 64,
            atlas_rows: 8,
            atlas_cols: 8,
            atlas_cell_size: 128,
            vpl_source: VplSource::default(),
            max_rejection_attempts: 100_000,
            kernel_size: KERNEL_SIZE,
            scene_extent: 10.0,
            indirect_strength: 4.0,
            dump_dir: None,
            seed: Seed::Entropy,
        }
    }
}

impl RenderConfig {
    pub fn atlas_layout(&self) -> Result<AtlasLayout> {
        let layout = AtlasLayout::new(self.atlas_rows, self.atlas_cols, self.atlas_cell_size)?;
        layout.ensure_fits(self.vpl_count)?;
        Ok(layout)
    }

    pub fn light_map_extent(&self) -> ViewportSize {
        ViewportSize::new(self.light_map_size, self.light_map_size)
    }

    /// Power of a single VPL.
    pub fn vpl_flux(&self) -> f32 {
        self.indirect_strength / self.vpl_count.max(1) as f32
    }
}
