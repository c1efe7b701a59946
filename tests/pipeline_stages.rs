//! Stage ordering and caching of `ShadowPipeline`, observed through a
//! backend that records every call.

use image::{Rgba32FImage, RgbaImage};
use shadowmaps::pipeline::{AccumulateRow, CompositeJob, VplSource};
use shadowmaps::prelude::*;
use shadowmaps::sampling::DiscKernel;
use shadowmaps::stage::{DrawMode, LightSpace};
use shadowmaps::target::AtlasLayout;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    UploadKernel(usize),
    PrepareScene,
    LightPass(DrawMode),
    CreateAtlas,
    AtlasRow { first_cell: usize, count: usize },
    GBuffer(ViewportSize),
    CreateAccumulators(ViewportSize),
    ClearAccum,
    AccumulateRow { row: u32, first_cell: usize, count: usize },
    Composite { mode: ShadowMode, irradiance: bool },
}

#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
    next_id: u32,
}

impl Recorder {
    fn take(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for Recorder {
    type Target = u32;
    type Accum = ViewportSize;
    type GBuffer = ViewportSize;

    fn upload_kernel(&mut self, kernel: &DiscKernel) -> Result<()> {
        self.calls.push(Call::UploadKernel(kernel.len()));
        Ok(())
    }

    fn prepare_scene(&mut self, _scene: &Scene) -> Result<()> {
        self.calls.push(Call::PrepareScene);
        Ok(())
    }

    fn light_pass(
        &mut self,
        _scene: &Scene,
        _light: &LightSpace,
        mode: DrawMode,
        _size: ViewportSize,
        _scene_extent: f32,
    ) -> Result<u32> {
        self.calls.push(Call::LightPass(mode));
        Ok(self.id())
    }

    fn create_atlas(&mut self, _layout: &AtlasLayout) -> Result<u32> {
        self.calls.push(Call::CreateAtlas);
        Ok(self.id())
    }

    fn draw_atlas_row(
        &mut self,
        _atlas: &mut u32,
        _scene: &Scene,
        _layout: &AtlasLayout,
        first_cell: usize,
        vpls: &[Vpl],
    ) -> Result<()> {
        self.calls.push(Call::AtlasRow { first_cell, count: vpls.len() });
        Ok(())
    }

    fn camera_gbuffer(
        &mut self,
        _scene: &Scene,
        _view: &ViewTransforms,
        size: ViewportSize,
    ) -> Result<ViewportSize> {
        self.calls.push(Call::GBuffer(size));
        Ok(size)
    }

    fn create_accumulators(&mut self, size: ViewportSize) -> Result<[ViewportSize; 2]> {
        self.calls.push(Call::CreateAccumulators(size));
        Ok([size, size])
    }

    fn clear_accum(&mut self, _accum: &mut ViewportSize) -> Result<()> {
        self.calls.push(Call::ClearAccum);
        Ok(())
    }

    fn accumulate_row(&mut self, job: AccumulateRow<'_, Self>) -> Result<()> {
        self.calls.push(Call::AccumulateRow {
            row: job.row,
            first_cell: job.first_cell,
            count: job.vpls.len(),
        });
        Ok(())
    }

    fn composite(&mut self, _scene: &Scene, job: &CompositeJob<'_, Self>) -> Result<u32> {
        self.calls.push(Call::Composite {
            mode: job.mode,
            irradiance: job.irradiance.is_some(),
        });
        Ok(self.id())
    }

    fn read_back(&mut self, _target: &u32) -> Result<RgbaImage> {
        Ok(RgbaImage::new(1, 1))
    }

    fn read_back_accum(&mut self, accum: &ViewportSize) -> Result<Rgba32FImage> {
        Ok(Rgba32FImage::new(accum.width, accum.height))
    }
}

const SIZE: ViewportSize = ViewportSize::new(32, 24);

fn config() -> RenderConfig {
    RenderConfig {
        vpl_count: 10,
        atlas_rows: 3,
        atlas_cols: 4,
        atlas_cell_size: 16,
        vpl_source: VplSource::SurfaceArea { max_area_per_sample: 1.0 },
        seed: Seed::Fixed(11),
        ..Default::default()
    }
}

fn setup(mode: ShadowMode) -> (ShadowPipeline<Recorder>, Scene, ArcballController) {
    let config = config();
    let camera = ArcballController::new(config.camera, SIZE);
    let mut pipeline = ShadowPipeline::new(Recorder::default(), config).unwrap();
    pipeline.set_mode(mode);
    let kernel_len = pipeline.kernel().len();
    assert_eq!(calls(&mut pipeline), vec![Call::UploadKernel(kernel_len)]);
    let scene = Scene::load(None, ReceiverKind::ColorBox).unwrap();
    (pipeline, scene, camera)
}

fn calls(pipeline: &mut ShadowPipeline<Recorder>) -> Vec<Call> {
    pipeline.backend_mut().take()
}

fn ism_accumulation() -> Vec<Call> {
    vec![
        Call::AccumulateRow { row: 0, first_cell: 0, count: 4 },
        Call::AccumulateRow { row: 1, first_cell: 4, count: 4 },
        Call::AccumulateRow { row: 2, first_cell: 8, count: 2 },
    ]
}

#[test]
fn test_sm_runs_only_depth_pass() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Sm);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();

    assert_eq!(
        calls(&mut pipeline),
        vec![
            Call::PrepareScene,
            Call::LightPass(DrawMode::Depth),
            Call::Composite { mode: ShadowMode::Sm, irradiance: false },
        ]
    );
    assert!(pipeline.vpls().is_none());
}

#[test]
fn test_rsm_runs_all_light_passes_without_vpls() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Rsm);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();

    let recorded = calls(&mut pipeline);
    let passes: Vec<DrawMode> = recorded
        .iter()
        .filter_map(|c| match c {
            Call::LightPass(mode) => Some(*mode),
            _ => None,
        })
        .collect();
    assert_eq!(passes, DrawMode::ALL.to_vec());
    assert!(!recorded.contains(&Call::CreateAtlas));
    assert_eq!(
        recorded.last(),
        Some(&Call::Composite { mode: ShadowMode::Rsm, irradiance: false })
    );
}

#[test]
fn test_ism_first_frame_order() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Ism);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();

    let mut expected = vec![Call::PrepareScene];
    expected.extend(DrawMode::ALL.iter().map(|&m| Call::LightPass(m)));
    expected.extend([
        Call::CreateAtlas,
        Call::AtlasRow { first_cell: 0, count: 4 },
        Call::AtlasRow { first_cell: 4, count: 4 },
        Call::AtlasRow { first_cell: 8, count: 2 },
        Call::GBuffer(SIZE),
        Call::CreateAccumulators(SIZE),
        Call::ClearAccum,
    ]);
    expected.extend(ism_accumulation());
    expected.push(Call::Composite { mode: ShadowMode::Ism, irradiance: true });

    assert_eq!(calls(&mut pipeline), expected);
    assert_eq!(pipeline.vpls().map(|v| v.len()), Some(10));
}

#[test]
fn test_unchanged_camera_reuses_irradiance() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Ism);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    calls(&mut pipeline);

    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    assert_eq!(
        calls(&mut pipeline),
        vec![Call::Composite { mode: ShadowMode::Ism, irradiance: true }]
    );
}

#[test]
fn test_camera_move_reaccumulates_with_same_buffers() {
    let (mut pipeline, scene, mut camera) = setup(ShadowMode::Ism);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    let vpls_before = pipeline.vpls().map(|v| v.to_vec());
    calls(&mut pipeline);

    camera.scroll(120.0);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();

    let mut expected = vec![Call::GBuffer(SIZE), Call::ClearAccum];
    expected.extend(ism_accumulation());
    expected.push(Call::Composite { mode: ShadowMode::Ism, irradiance: true });
    assert_eq!(calls(&mut pipeline), expected);
    assert_eq!(pipeline.vpls().map(|v| v.to_vec()), vpls_before);
}

#[test]
fn test_resize_allocates_new_accumulators() {
    let (mut pipeline, scene, mut camera) = setup(ShadowMode::Ism);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    calls(&mut pipeline);

    let bigger = ViewportSize::new(64, 48);
    camera.resize(bigger);
    pipeline.render_frame(&scene, &camera.transforms(), bigger).unwrap();

    let recorded = calls(&mut pipeline);
    assert_eq!(recorded[0], Call::GBuffer(bigger));
    assert_eq!(recorded[1], Call::CreateAccumulators(bigger));
}

#[test]
fn test_mode_switch_adds_missing_stages_only() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Sm);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    calls(&mut pipeline);

    pipeline.set_mode(ShadowMode::Ism);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    let recorded = calls(&mut pipeline);

    assert!(!recorded.contains(&Call::PrepareScene));
    assert!(!recorded.contains(&Call::LightPass(DrawMode::Depth)));
    assert!(recorded.contains(&Call::LightPass(DrawMode::Albedo)));
    assert!(recorded.contains(&Call::CreateAtlas));

    pipeline.set_mode(ShadowMode::Sm);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    assert_eq!(
        calls(&mut pipeline),
        vec![Call::Composite { mode: ShadowMode::Sm, irradiance: false }]
    );
}

#[test]
fn test_invalidate_reruns_everything() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Ism);
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    let first = calls(&mut pipeline);

    pipeline.invalidate();
    assert!(pipeline.last_frame().is_none());
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    assert_eq!(calls(&mut pipeline), first);
}

#[test]
fn test_empty_viewport_is_an_error() {
    let (mut pipeline, scene, camera) = setup(ShadowMode::Ism);
    let result = pipeline.render_frame(&scene, &camera.transforms(), ViewportSize::new(0, 24));
    assert!(result.is_err());
    assert!(calls(&mut pipeline).is_empty());
}

#[test]
fn test_read_back_before_first_frame_fails() {
    let (mut pipeline, _scene, _camera) = setup(ShadowMode::Sm);
    assert!(pipeline.read_back_frame().is_err());
}

#[test]
fn test_kernel_is_uploaded_once() {
    let config = config();
    let camera = ArcballController::new(config.camera, SIZE);
    let scene = Scene::load(None, ReceiverKind::ColorBox).unwrap();
    let mut pipeline = ShadowPipeline::new(Recorder::default(), config).unwrap();
    let kernel_len = pipeline.kernel().len();
    assert!(kernel_len > 0);

    for mode in ShadowMode::ALL {
        pipeline.set_mode(mode);
        pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();
    }
    pipeline.invalidate();
    pipeline.render_frame(&scene, &camera.transforms(), SIZE).unwrap();

    let uploads = calls(&mut pipeline)
        .into_iter()
        .filter(|c| matches!(c, Call::UploadKernel(_)))
        .collect::<Vec<_>>();
    assert_eq!(uploads, vec![Call::UploadKernel(kernel_len)]);
}
