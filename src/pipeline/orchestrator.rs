//! Per-frame sequencing of the shadow stages.

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::backend::{AccumulateRow, CompositeJob, RenderBackend};
use super::cache::ShadowPipelineCache;
use super::config::{RenderConfig, VplSource};
use super::dump::{Dumper, ATLAS_STEM, IRRADIANCE_FILE};
use super::ShadowMode;
use crate::camera::{ViewTransforms, ViewportSize};
use crate::geom::Scene;
use crate::sampling::{sample_rejection, sample_surface, DiscKernel, LightSpaceImages, Vpl};
use crate::stage::{DrawMode, LightSpace};
use crate::target::AtlasLayout;
use crate::util::{Error, Result};

/// Runs the stages a [`ShadowMode`] needs, caching everything that only
/// depends on the light and the geometry.
///
/// The disc kernel is generated once in [`new`](Self::new) and reused for
/// every frame. VPLs and atlas are built on the first ISM frame. Irradiance
/// is re-accumulated whenever the camera pose or frame size changes.
pub struct ShadowPipeline<B: RenderBackend> {
    backend: B,
    config: RenderConfig,
    layout: AtlasLayout,
    mode: ShadowMode,
    kernel: DiscKernel,
    rng: StdRng,
    cache: ShadowPipelineCache<B::Target, B::Accum>,
    /// Second half of the ping-pong pair; the first lives in the cache.
    scratch: Option<(ViewportSize, B::Accum)>,
    frame: Option<B::Target>,
    dumper: Option<Dumper>,
    scene_prepared: bool,
}

impl<B: RenderBackend> ShadowPipeline<B> {
    pub fn new(mut backend: B, config: RenderConfig) -> Result<Self> {
        let layout = config.atlas_layout()?;
        let mut rng = config.seed.rng();
        let kernel = DiscKernel::generate(&mut rng, config.kernel_size);
        backend.upload_kernel(&kernel)?;
        let dumper = config.dump_dir.as_ref().map(|dir| Dumper::new(dir));

        log::info!(
            "Shadow pipeline: {} VPLs in {}x{} atlas of {}px cells, {} kernel samples, seed {:?}",
            config.vpl_count,
            layout.rows,
            layout.cols,
            layout.cell_size,
            kernel.len(),
            config.seed
        );

        Ok(Self {
            backend,
            config,
            layout,
            mode: ShadowMode::default(),
            kernel,
            rng,
            cache: ShadowPipelineCache::new(),
            scratch: None,
            frame: None,
            dumper,
            scene_prepared: false,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn mode(&self) -> ShadowMode {
        self.mode
    }

    /// Takes effect on the next frame. Cached light results are kept.
    pub fn set_mode(&mut self, mode: ShadowMode) {
        if mode != self.mode {
            log::info!("Shadow mode: {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn kernel(&self) -> &DiscKernel {
        &self.kernel
    }

    pub fn cache(&self) -> &ShadowPipelineCache<B::Target, B::Accum> {
        &self.cache
    }

    pub fn vpls(&self) -> Option<&[Vpl]> {
        self.cache.vpls()
    }

    /// Drop every cached result; the next frame recomputes them.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
        self.scratch = None;
        self.frame = None;
        self.scene_prepared = false;
    }

    pub fn last_frame(&self) -> Option<&B::Target> {
        self.frame.as_ref()
    }

    /// Copy the last composited frame to the CPU.
    pub fn read_back_frame(&mut self) -> Result<RgbaImage> {
        match &self.frame {
            Some(frame) => self.backend.read_back(frame),
            None => Err(Error::other("no frame has been rendered yet")),
        }
    }

    /// Run the light-dependent stages the current mode needs and that are
    /// not cached yet.
    pub fn prepare(&mut self, scene: &Scene) -> Result<()> {
        if !self.scene_prepared {
            self.backend.prepare_scene(scene)?;
            self.scene_prepared = true;
        }

        let light = match self.cache.light() {
            Some(light) => *light,
            None => {
                let light = LightSpace::new(&self.config.light, self.config.light_map_extent());
                self.cache.set_light(light);
                light
            }
        };

        self.run_light_stage(scene, &light)?;

        if self.mode.uses_vpls() && (self.cache.vpls().is_none() || self.cache.atlas().is_none()) {
            let vpls = {
                let _span = tracing::info_span!("vpl_sampling").entered();
                self.sample_vpls(scene, &light)?
            };
            let atlas = {
                let _span = tracing::info_span!("ism_atlas", vpls = vpls.len()).entered();
                self.render_atlas(scene, &vpls)?
            };
            self.cache.set_vpls(vpls);
            self.cache.set_atlas(self.layout, atlas);
        }

        self.dump(|pipeline| pipeline.dump_light_outputs());
        Ok(())
    }

    /// Render one frame for the camera `view` at `size`.
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        view: &ViewTransforms,
        size: ViewportSize,
    ) -> Result<&B::Target> {
        if size.is_empty() {
            return Err(Error::other(format!(
                "cannot render a {}x{} frame",
                size.width, size.height
            )));
        }

        self.prepare(scene)?;
        if self.mode.uses_vpls() {
            self.accumulate_irradiance(scene, view, size)?;
        }

        let Some(light) = self.cache.light().copied() else {
            return Err(Error::other("light transforms missing after prepare"));
        };

        let frame = {
            let _span = tracing::info_span!("composite", mode = self.mode.label()).entered();
            let job = CompositeJob {
                mode: self.mode,
                light: &light,
                light_targets: self.cache.targets(),
                irradiance: if self.mode.uses_vpls() {
                    self.cache.irradiance()
                } else {
                    None
                },
                kernel: &self.kernel,
                view,
                size,
                scene_extent: self.config.scene_extent,
                indirect_strength: self.config.indirect_strength,
            };
            self.backend.composite(scene, &job)?
        };

        Ok(self.frame.insert(frame))
    }

    fn run_light_stage(&mut self, scene: &Scene, light: &LightSpace) -> Result<()> {
        let _span = tracing::info_span!("light_stage", mode = self.mode.label()).entered();
        let size = self.config.light_map_extent();

        for &pass in self.mode.light_passes() {
            if self.cache.target(pass).is_some() {
                continue;
            }
            log::debug!("Light pass {:?} at {}x{}", pass, size.width, size.height);
            let target = self
                .backend
                .light_pass(scene, light, pass, size, self.config.scene_extent)?;
            self.cache.insert_target(pass, target);
        }
        Ok(())
    }

    fn sample_vpls(&mut self, scene: &Scene, light: &LightSpace) -> Result<Vec<Vpl>> {
        let count = self.config.vpl_count;

        let vpls = match self.config.vpl_source {
            VplSource::Rejection => {
                let (Some(depth), Some(normal), Some(albedo)) = (
                    self.cache.target(DrawMode::Depth),
                    self.cache.target(DrawMode::Normal),
                    self.cache.target(DrawMode::Albedo),
                ) else {
                    return Err(Error::other("light-space targets missing for VPL sampling"));
                };
                let depth = self.backend.read_back(depth)?;
                let normal = self.backend.read_back(normal)?;
                let albedo = self.backend.read_back(albedo)?;

                let images = LightSpaceImages {
                    depth: &depth,
                    normal: &normal,
                    albedo: &albedo,
                    inverse_view_projection: light.inverse_view_projection(),
                };
                let outcome = sample_rejection(
                    &images,
                    count,
                    self.config.max_rejection_attempts,
                    &mut self.rng,
                );
                log::info!(
                    "Rejection sampling: {} VPLs after {} attempts",
                    outcome.vpls.len(),
                    outcome.attempts
                );
                outcome.vpls
            }
            VplSource::SurfaceArea { max_area_per_sample } => {
                let mut vpls = sample_surface(&scene.casters(), max_area_per_sample, &mut self.rng);
                if vpls.len() > count {
                    log::debug!("Keeping {} of {} surface VPLs", count, vpls.len());
                    vpls.shuffle(&mut self.rng);
                    vpls.truncate(count);
                }
                vpls
            }
        };

        Ok(vpls)
    }

    fn render_atlas(&mut self, scene: &Scene, vpls: &[Vpl]) -> Result<B::Target> {
        let mut atlas = self.backend.create_atlas(&self.layout)?;
        for row in 0..self.layout.rows_used(vpls.len()) {
            let cells = self.layout.row_range(row, vpls.len());
            self.backend
                .draw_atlas_row(&mut atlas, scene, &self.layout, cells.start, &vpls[cells])?;
        }
        Ok(atlas)
    }

    /// Ping-pong accumulation over atlas rows; each row reads the sum the
    /// previous row wrote.
    fn accumulate_irradiance(
        &mut self,
        scene: &Scene,
        view: &ViewTransforms,
        size: ViewportSize,
    ) -> Result<()> {
        if self.cache.irradiance_for(view.model_view, size).is_some() {
            return Ok(());
        }
        let _span = tracing::info_span!("ism_accumulate", width = size.width, height = size.height).entered();

        let gbuffer = self.backend.camera_gbuffer(scene, view, size)?;

        let stale = self
            .cache
            .take_irradiance()
            .filter(|entry| entry.size == size)
            .map(|entry| entry.buffer);
        let scratch = self
            .scratch
            .take()
            .filter(|(s, _)| *s == size)
            .map(|(_, buffer)| buffer);
        let (mut front, mut back) = match (stale, scratch) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                let [a, b] = self.backend.create_accumulators(size)?;
                (a, b)
            }
        };
        self.backend.clear_accum(&mut front)?;

        let (Some(vpls), Some((layout, atlas))) = (self.cache.vpls(), self.cache.atlas()) else {
            return Err(Error::other("ISM accumulation needs VPLs and an atlas"));
        };
        let flux = self.config.vpl_flux();

        for row in 0..layout.rows_used(vpls.len()) {
            let cells = layout.row_range(row, vpls.len());
            self.backend.accumulate_row(AccumulateRow {
                previous: &front,
                output: &mut back,
                atlas,
                gbuffer: &gbuffer,
                layout,
                row,
                first_cell: cells.start,
                vpls: &vpls[cells],
                flux,
            })?;
            std::mem::swap(&mut front, &mut back);
        }

        self.scratch = Some((size, back));
        self.cache.store_irradiance(view.model_view, size, front);
        self.dump(|pipeline| pipeline.dump_irradiance());
        Ok(())
    }

    /// Run a dump step; a failing dump disables further dumps.
    fn dump(&mut self, step: impl FnOnce(&mut Self) -> Result<()>) {
        if self.dumper.is_none() {
            return;
        }
        if let Err(err) = step(self) {
            log::warn!("Disabling buffer dumps: {}", err);
            self.dumper = None;
        }
    }

    fn dump_light_outputs(&mut self) -> Result<()> {
        let Some(dumper) = self.dumper.as_mut() else {
            return Ok(());
        };

        for mode in DrawMode::ALL {
            let stem = mode.file_stem();
            if dumper.is_written(&format!("{}.png", stem)) {
                continue;
            }
            if let Some(target) = self.cache.target(mode) {
                let image = self.backend.read_back(target)?;
                dumper.dump_png(stem, &image)?;
            }
        }

        if !dumper.is_written(&format!("{}.png", ATLAS_STEM)) {
            if let Some((_, atlas)) = self.cache.atlas() {
                let image = self.backend.read_back(atlas)?;
                dumper.dump_png(ATLAS_STEM, &image)?;
            }
        }
        Ok(())
    }

    fn dump_irradiance(&mut self) -> Result<()> {
        let Some(dumper) = self.dumper.as_mut() else {
            return Ok(());
        };
        if dumper.is_written(IRRADIANCE_FILE) {
            return Ok(());
        }
        if let Some(buffer) = self.cache.irradiance() {
            let image = self.backend.read_back_accum(buffer)?;
            dumper.dump_irradiance(&image)?;
        }
        Ok(())
    }
}
