//! CPU implementation of [`RenderBackend`].
//!
//! Used by the headless `render` command and by the integration tests.
//! Every pass rasterizes with [`crate::raster`] and shades with the same
//! functions the GPU shaders mirror.

use image::{Rgba, Rgba32FImage, RgbaImage};

use super::backend::{AccumulateRow, CompositeJob, RenderBackend};
use crate::camera::{ViewTransforms, ViewportSize};
use crate::geom::Scene;
use crate::raster::{DepthBuffer, Fragment, Rasterizer};
use crate::sampling::{DiscKernel, Vpl};
use crate::stage::composite::{self, LightMaps, ShadingInputs};
use crate::stage::ism::{cell_visibility, encode_vpl_distance, vpl_contribution, vpl_view_projection};
use crate::stage::{DrawMode, LightSpace};
use crate::target::{AtlasLayout, PixelRect, BACKGROUND};
use crate::util::{Error, Result, Vec3};

/// Frame clear color.
pub const CLEAR_COLOR: Vec3 = Vec3::new(0.1, 0.1, 0.12);

/// Camera-space surface sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surfel {
    pub world: Vec3,
    pub normal: Vec3,
}

/// Per-pixel camera G-buffer; `None` where no geometry was drawn.
pub struct SoftwareGBuffer {
    size: ViewportSize,
    texels: Vec<Option<Surfel>>,
}

impl SoftwareGBuffer {
    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Surfel> {
        self.texels[(y * self.size.width + x) as usize]
    }
}

#[derive(Debug, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RenderBackend for SoftwareBackend {
    type Target = RgbaImage;
    type Accum = Rgba32FImage;
    type GBuffer = SoftwareGBuffer;

    fn upload_kernel(&mut self, _kernel: &DiscKernel) -> Result<()> {
        // Composite reads the kernel straight from the job.
        Ok(())
    }

    fn prepare_scene(&mut self, scene: &Scene) -> Result<()> {
        log::debug!(
            "Software backend: {} + {} triangles",
            scene.object.triangle_count(),
            scene.receiver.triangle_count()
        );
        Ok(())
    }

    fn light_pass(
        &mut self,
        scene: &Scene,
        light: &LightSpace,
        mode: DrawMode,
        size: ViewportSize,
        scene_extent: f32,
    ) -> Result<RgbaImage> {
        let mut image = RgbaImage::from_pixel(size.width, size.height, mode.clear_color());
        let mut depth = DepthBuffer::new(PixelRect::full(size.width, size.height));
        let mut raster = Rasterizer::new(&mut depth);
        let view_projection = light.view_projection();

        for geometry in scene.casters() {
            raster.draw_geometry(geometry, view_projection, |f: &Fragment| {
                image.put_pixel(f.x, f.y, mode.encode(f, scene_extent));
            });
        }
        Ok(image)
    }

    fn create_atlas(&mut self, layout: &AtlasLayout) -> Result<RgbaImage> {
        let size = layout.size();
        Ok(RgbaImage::from_pixel(size.width, size.height, BACKGROUND))
    }

    fn draw_atlas_row(
        &mut self,
        atlas: &mut RgbaImage,
        scene: &Scene,
        layout: &AtlasLayout,
        first_cell: usize,
        vpls: &[Vpl],
    ) -> Result<()> {
        for (i, vpl) in vpls.iter().enumerate() {
            let mut depth = DepthBuffer::new(layout.cell_rect(first_cell + i));
            let mut raster = Rasterizer::new(&mut depth);
            let view_projection = vpl_view_projection(vpl);
            for geometry in scene.casters() {
                raster.draw_geometry(geometry, view_projection, |f: &Fragment| {
                    atlas.put_pixel(f.x, f.y, encode_vpl_distance(vpl, f.world));
                });
            }
        }
        Ok(())
    }

    fn camera_gbuffer(
        &mut self,
        scene: &Scene,
        view: &ViewTransforms,
        size: ViewportSize,
    ) -> Result<SoftwareGBuffer> {
        let mut texels = vec![None; size.pixel_count()];
        let mut depth = DepthBuffer::new(PixelRect::full(size.width, size.height));
        let mut raster = Rasterizer::new(&mut depth);
        let view_projection = view.view_projection();

        for draw in scene.draws() {
            raster.draw_geometry(draw.geometry, view_projection, |f: &Fragment| {
                texels[(f.y * size.width + f.x) as usize] = Some(Surfel {
                    world: f.world,
                    normal: f.normal.normalize_or_zero(),
                });
            });
        }
        Ok(SoftwareGBuffer { size, texels })
    }

    fn create_accumulators(&mut self, size: ViewportSize) -> Result<[Rgba32FImage; 2]> {
        Ok([
            Rgba32FImage::new(size.width, size.height),
            Rgba32FImage::new(size.width, size.height),
        ])
    }

    fn clear_accum(&mut self, accum: &mut Rgba32FImage) -> Result<()> {
        accum.pixels_mut().for_each(|p| *p = Rgba([0.0; 4]));
        Ok(())
    }

    fn accumulate_row(&mut self, job: AccumulateRow<'_, Self>) -> Result<()> {
        let size = job.gbuffer.size();
        if job.previous.dimensions() != (size.width, size.height)
            || job.output.dimensions() != (size.width, size.height)
        {
            return Err(Error::other("accumulation buffers do not match the G-buffer size"));
        }

        for y in 0..size.height {
            for x in 0..size.width {
                let mut sum = *job.previous.get_pixel(x, y);
                if let Some(surfel) = job.gbuffer.get(x, y) {
                    let mut row_sum = Vec3::ZERO;
                    for (i, vpl) in job.vpls.iter().enumerate() {
                        let visibility =
                            cell_visibility(job.atlas, job.layout, job.first_cell + i, vpl, surfel.world);
                        row_sum += vpl_contribution(vpl, surfel.world, surfel.normal, visibility, job.flux);
                    }
                    sum.0[0] += row_sum.x;
                    sum.0[1] += row_sum.y;
                    sum.0[2] += row_sum.z;
                    sum.0[3] = 1.0;
                }
                job.output.put_pixel(x, y, sum);
            }
        }
        Ok(())
    }

    fn composite(&mut self, scene: &Scene, job: &CompositeJob<'_, Self>) -> Result<RgbaImage> {
        let Some(depth_map) = job.light_targets[DrawMode::Depth.index()].as_ref() else {
            return Err(Error::other("composite needs the light depth map"));
        };
        let inputs = ShadingInputs {
            mode: job.mode,
            light: job.light,
            maps: LightMaps {
                depth: depth_map,
                normal: job.light_targets[DrawMode::Normal.index()].as_ref(),
                position: job.light_targets[DrawMode::Position.index()].as_ref(),
                albedo: job.light_targets[DrawMode::Albedo.index()].as_ref(),
            },
            kernel: job.kernel,
            scene_extent: job.scene_extent,
            indirect_strength: job.indirect_strength,
        };

        let size = job.size;
        let mut frame = RgbaImage::from_pixel(size.width, size.height, composite::to_rgba8(CLEAR_COLOR));
        let mut depth = DepthBuffer::new(PixelRect::full(size.width, size.height));
        let mut raster = Rasterizer::new(&mut depth);
        let view_projection = job.view.view_projection();

        for draw in scene.draws() {
            raster.draw_geometry(draw.geometry, view_projection, |f: &Fragment| {
                let irradiance = job
                    .irradiance
                    .filter(|acc| acc.dimensions() == (size.width, size.height))
                    .map(|acc| {
                        let [r, g, b, _] = acc.get_pixel(f.x, f.y).0;
                        Vec3::new(r, g, b)
                    })
                    .unwrap_or(Vec3::ZERO);
                let color = composite::shade(
                    &inputs,
                    f.world,
                    f.normal.normalize_or_zero(),
                    f.color,
                    draw.receive_shadow,
                    irradiance,
                );
                frame.put_pixel(f.x, f.y, composite::to_rgba8(color));
            });
        }
        Ok(frame)
    }

    fn read_back(&mut self, target: &RgbaImage) -> Result<RgbaImage> {
        Ok(target.clone())
    }

    fn read_back_accum(&mut self, accum: &Rgba32FImage) -> Result<Rgba32FImage> {
        Ok(accum.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, Projection};
    use crate::geom::GeometryBuffer;
    use crate::target::decode_depth;
    use crate::util::Mat4;

    fn floor_scene() -> Scene {
        Scene::new(
            GeometryBuffer::cube(Vec3::new(0.0, 1.0, 0.0), 0.5, Vec3::splat(0.5)),
            GeometryBuffer::color_box(5.0, -1.0),
        )
    }

    fn overhead_light() -> LightSpace {
        let camera = Camera::new(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::ZERO,
            Vec3::Z,
            Projection::Orthographic {
                left: -6.0,
                right: 6.0,
                bottom: -6.0,
                top: 6.0,
                near: 0.0,
                far: 20.0,
            },
        );
        LightSpace::new(&camera, ViewportSize::new(64, 64))
    }

    #[test]
    fn test_light_depth_sees_cube_above_floor() {
        let mut backend = SoftwareBackend::new();
        let scene = floor_scene();
        let light = overhead_light();
        let depth = backend
            .light_pass(&scene, &light, DrawMode::Depth, ViewportSize::new(64, 64), 10.0)
            .unwrap();
        // Cube top at y = 1.5 is 8.5 below the light; floor at y = -1 is 11 below
        let center = decode_depth(*depth.get_pixel(32, 32));
        assert!((center - 8.5 / 20.0).abs() < 0.01, "center depth {center}");
        let edge = decode_depth(*depth.get_pixel(10, 32));
        assert!((edge - 11.0 / 20.0).abs() < 0.01, "floor depth {edge}");
    }

    #[test]
    fn test_atlas_row_fills_only_its_cells() {
        let mut backend = SoftwareBackend::new();
        let scene = floor_scene();
        let layout = AtlasLayout::new(2, 2, 16).unwrap();
        let mut atlas = backend.create_atlas(&layout).unwrap();
        let vpl = Vpl::new(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, Vec3::ONE);
        backend.draw_atlas_row(&mut atlas, &scene, &layout, 2, &[vpl]).unwrap();

        let untouched = (0..16).all(|y| (0..32).all(|x| *atlas.get_pixel(x, y) == BACKGROUND));
        assert!(untouched);
        assert_ne!(*atlas.get_pixel(8, 24), BACKGROUND);
        assert!((24..32).all(|y| (16..32).all(|x| *atlas.get_pixel(x, y) == BACKGROUND)));
    }

    #[test]
    fn test_gbuffer_marks_background() {
        let mut backend = SoftwareBackend::new();
        let scene = floor_scene();
        let view = ViewTransforms {
            model_view: Mat4::look_at_rh(Vec3::new(0.0, 20.0, 0.1), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(30f32.to_radians(), 1.0, 1.0, 100.0),
        };
        let gbuffer = backend.camera_gbuffer(&scene, &view, ViewportSize::new(32, 32)).unwrap();
        let center = gbuffer.get(16, 16).unwrap();
        assert!((center.world.y - 1.5).abs() < 0.05);
        assert!(center.normal.y > 0.99);
    }
}
