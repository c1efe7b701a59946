//! Seam between the pipeline's sequencing and the code that draws.

use image::{Rgba32FImage, RgbaImage};

use super::ShadowMode;
use crate::camera::{ViewTransforms, ViewportSize};
use crate::geom::Scene;
use crate::sampling::{DiscKernel, Vpl};
use crate::stage::{DrawMode, LightSpace};
use crate::target::AtlasLayout;
use crate::util::Result;

/// One atlas row's contribution added on top of the previous running sum.
pub struct AccumulateRow<'a, B: RenderBackend + ?Sized> {
    pub previous: &'a B::Accum,
    pub output: &'a mut B::Accum,
    pub atlas: &'a B::Target,
    pub gbuffer: &'a B::GBuffer,
    pub layout: &'a AtlasLayout,
    pub row: u32,
    /// Atlas cell of `vpls[0]`.
    pub first_cell: usize,
    pub vpls: &'a [Vpl],
    pub flux: f32,
}

/// Everything the composite pass binds for one frame.
pub struct CompositeJob<'a, B: RenderBackend + ?Sized> {
    pub mode: ShadowMode,
    pub light: &'a LightSpace,
    /// Indexed by [`DrawMode::index`]; only the mode's passes are present.
    pub light_targets: &'a [Option<B::Target>; 4],
    pub irradiance: Option<&'a B::Accum>,
    pub kernel: &'a DiscKernel,
    pub view: &'a ViewTransforms,
    pub size: ViewportSize,
    pub scene_extent: f32,
    pub indirect_strength: f32,
}

/// A renderer able to run every stage of the shadow pipeline.
///
/// Calls arrive in frame order on one thread. A target returned by one
/// call is complete before any later call samples it.
pub trait RenderBackend {
    /// Off-screen RGBA8 image: light-space maps, the atlas and frames.
    type Target;
    /// Float screen-space accumulation buffer.
    type Accum;
    /// Camera-space world position and normal per pixel.
    type GBuffer;

    /// Make the disc kernel available to the composite pass. Called once,
    /// when the pipeline is built; every later composite reuses it.
    fn upload_kernel(&mut self, kernel: &DiscKernel) -> Result<()>;

    /// Upload or index scene geometry. Called before any pass.
    fn prepare_scene(&mut self, scene: &Scene) -> Result<()>;

    /// Render one light-space sub-pass.
    fn light_pass(
        &mut self,
        scene: &Scene,
        light: &LightSpace,
        mode: DrawMode,
        size: ViewportSize,
        scene_extent: f32,
    ) -> Result<Self::Target>;

    /// A cleared atlas target sized for `layout`.
    fn create_atlas(&mut self, layout: &AtlasLayout) -> Result<Self::Target>;

    /// Render the casters once for all `vpls` of one atlas row, each into
    /// its own cell starting at `first_cell`.
    fn draw_atlas_row(
        &mut self,
        atlas: &mut Self::Target,
        scene: &Scene,
        layout: &AtlasLayout,
        first_cell: usize,
        vpls: &[Vpl],
    ) -> Result<()>;

    fn camera_gbuffer(
        &mut self,
        scene: &Scene,
        view: &ViewTransforms,
        size: ViewportSize,
    ) -> Result<Self::GBuffer>;

    /// A ping-pong pair of accumulation buffers.
    fn create_accumulators(&mut self, size: ViewportSize) -> Result<[Self::Accum; 2]>;

    fn clear_accum(&mut self, accum: &mut Self::Accum) -> Result<()>;

    fn accumulate_row(&mut self, job: AccumulateRow<'_, Self>) -> Result<()>;

    /// Draw the object and the receiver from the camera.
    fn composite(&mut self, scene: &Scene, job: &CompositeJob<'_, Self>) -> Result<Self::Target>;

    fn read_back(&mut self, target: &Self::Target) -> Result<RgbaImage>;

    fn read_back_accum(&mut self, accum: &Self::Accum) -> Result<Rgba32FImage>;
}
