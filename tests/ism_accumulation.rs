//! ISM atlas and irradiance accumulation on the software backend.

use image::Rgba32FImage;
use shadowmaps::pipeline::AccumulateRow;
use shadowmaps::prelude::*;
use shadowmaps::target::AtlasLayout;
use shadowmaps::util::Vec3;

const FRAME: ViewportSize = ViewportSize::new(48, 36);

fn scene() -> Scene {
    Scene::load(None, ReceiverKind::ColorBox).unwrap()
}

/// VPLs on the inside of the color box, each facing into the box.
fn wall_vpls() -> Vec<Vpl> {
    vec![
        Vpl::new(Vec3::new(-4.9, 1.0, 2.0), Vec3::X, Vec3::new(0.8, 0.1, 0.1)),
        Vpl::new(Vec3::new(4.9, 1.0, -2.0), -Vec3::X, Vec3::new(0.1, 0.8, 0.1)),
        Vpl::new(Vec3::new(2.0, -0.99, 3.0), Vec3::Y, Vec3::splat(0.8)),
        Vpl::new(Vec3::new(0.0, 2.0, -4.9), Vec3::Z, Vec3::splat(0.8)),
    ]
}

struct Fixture {
    backend: SoftwareBackend,
    scene: Scene,
    layout: AtlasLayout,
    gbuffer: shadowmaps::pipeline::software::SoftwareGBuffer,
}

impl Fixture {
    fn new(rows: u32) -> Self {
        let mut backend = SoftwareBackend::new();
        let scene = scene();
        let config = RenderConfig::default();
        let camera = ArcballController::new(config.camera, FRAME);
        let gbuffer = backend
            .camera_gbuffer(&scene, &camera.transforms(), FRAME)
            .unwrap();
        Self {
            backend,
            scene,
            layout: AtlasLayout::new(rows, 4, 32).unwrap(),
            gbuffer,
        }
    }

    fn atlas(&mut self, vpls: &[Vpl]) -> image::RgbaImage {
        let mut atlas = self.backend.create_atlas(&self.layout).unwrap();
        for row in 0..self.layout.rows_used(vpls.len()) {
            let cells = self.layout.row_range(row, vpls.len());
            self.backend
                .draw_atlas_row(&mut atlas, &self.scene, &self.layout, cells.start, &vpls[cells])
                .unwrap();
        }
        atlas
    }

    fn accumulate(
        &mut self,
        atlas: &image::RgbaImage,
        previous: &Rgba32FImage,
        row: u32,
        vpls: &[Vpl],
    ) -> Rgba32FImage {
        let [_, mut output] = self.backend.create_accumulators(FRAME).unwrap();
        let first_cell = (row * self.layout.cols) as usize;
        self.backend
            .accumulate_row(AccumulateRow {
                previous,
                output: &mut output,
                atlas,
                gbuffer: &self.gbuffer,
                layout: &self.layout,
                row,
                first_cell,
                vpls,
                flux: 0.25,
            })
            .unwrap();
        output
    }

    fn cleared(&mut self) -> Rgba32FImage {
        let [mut accum, _] = self.backend.create_accumulators(FRAME).unwrap();
        self.backend.clear_accum(&mut accum).unwrap();
        accum
    }
}

fn total(image: &Rgba32FImage) -> f32 {
    image.pixels().map(|p| p.0[0] + p.0[1] + p.0[2]).sum()
}

#[test]
fn test_row_gathers_indirect_light() {
    let mut fx = Fixture::new(1);
    let vpls = wall_vpls();
    let atlas = fx.atlas(&vpls);
    let cleared = fx.cleared();
    let sum = fx.accumulate(&atlas, &cleared, 0, &vpls);

    assert!(total(&sum) > 0.0);
    assert!(sum.pixels().all(|p| p.0.iter().all(|c| c.is_finite() && *c >= 0.0)));
}

#[test]
fn test_permutation_within_row_keeps_sum() {
    let mut fx = Fixture::new(1);
    let vpls = wall_vpls();
    let shuffled: Vec<Vpl> = [2, 0, 3, 1].iter().map(|&i| vpls[i]).collect();

    let cleared = fx.cleared();
    let atlas = fx.atlas(&vpls);
    let a = fx.accumulate(&atlas, &cleared, 0, &vpls);
    let atlas = fx.atlas(&shuffled);
    let b = fx.accumulate(&atlas, &cleared, 0, &shuffled);

    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for c in 0..3 {
            assert!(
                (pa.0[c] - pb.0[c]).abs() <= 1e-5 * pa.0[c].abs().max(1.0),
                "{:?} vs {:?}",
                pa,
                pb
            );
        }
    }
}

#[test]
fn test_rows_build_on_previous_sum() {
    let mut fx = Fixture::new(2);
    let mut vpls = wall_vpls();
    vpls.extend(wall_vpls().iter().map(|v| Vpl::new(v.position + Vec3::Y * 0.5, v.normal, v.albedo)));
    assert_eq!(fx.layout.rows_used(vpls.len()), 2);

    let atlas = fx.atlas(&vpls);
    let cleared = fx.cleared();
    let row0 = fx.accumulate(&atlas, &cleared, 0, &vpls[0..4]);
    let both = fx.accumulate(&atlas, &row0, 1, &vpls[4..8]);
    let row1_alone = fx.accumulate(&atlas, &cleared, 1, &vpls[4..8]);

    // The second row adds to what the first wrote instead of replacing it.
    for ((p0, p1), pb) in row0.pixels().zip(row1_alone.pixels()).zip(both.pixels()) {
        for c in 0..3 {
            let expected = p0.0[c] + p1.0[c];
            assert!((pb.0[c] - expected).abs() <= 1e-5 * expected.max(1.0));
        }
    }
    assert!(total(&both) > total(&row0));
}

#[test]
fn test_atlas_cells_outside_rows_stay_background() {
    let mut fx = Fixture::new(2);
    let vpls = wall_vpls();
    let atlas = fx.atlas(&vpls);

    // Second row is unused with four VPLs.
    let rect = fx.layout.cell_rect(5);
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            assert_eq!(*atlas.get_pixel(x, y), shadowmaps::target::BACKGROUND);
        }
    }
}

#[test]
fn test_mismatched_accumulator_is_rejected() {
    let mut fx = Fixture::new(1);
    let vpls = wall_vpls();
    let atlas = fx.atlas(&vpls);
    let [previous, mut output] = fx
        .backend
        .create_accumulators(ViewportSize::new(8, 8))
        .unwrap();

    let result = fx.backend.accumulate_row(AccumulateRow {
        previous: &previous,
        output: &mut output,
        atlas: &atlas,
        gbuffer: &fx.gbuffer,
        layout: &fx.layout,
        row: 0,
        first_cell: 0,
        vpls: &vpls,
        flux: 0.25,
    });
    assert!(result.is_err());
}

/// Irradiance at the frame centre from one VPL `height` above the centroid
/// of a single upward-facing triangle, through gbuffer, atlas and row
/// accumulation.
fn single_triangle_irradiance(height: f32, vpl_normal: Vec3) -> f32 {
    let surface = "v -1 0 1\nv 1 0 1\nv 0 0 -1\nf 1 2 3\n";
    let triangle =
        GeometryBuffer::from_surface_reader(std::io::Cursor::new(surface), Vec3::splat(0.5)).unwrap();
    assert_eq!(triangle.normals()[0], Vec3::Y);
    let centroid = Vec3::new(0.0, 0.0, 1.0 / 3.0);
    let scene = Scene::new(triangle, GeometryBuffer::default());

    let size = ViewportSize::new(32, 32);
    let camera = Camera::new(
        centroid + Vec3::Y * 5.0,
        centroid,
        Vec3::NEG_Z,
        Projection::Perspective { fov_y_degrees: 45.0, near: 1.0, far: 100.0 },
    );
    let view = ViewTransforms {
        model_view: camera.view_matrix(),
        projection: camera.projection.matrix(size.aspect()),
    };

    let mut backend = SoftwareBackend::new();
    let gbuffer = backend.camera_gbuffer(&scene, &view, size).unwrap();
    assert!(gbuffer.get(16, 16).is_some());

    let layout = AtlasLayout::new(1, 1, 32).unwrap();
    let vpls = [Vpl::new(centroid + Vec3::Y * height, vpl_normal, Vec3::ONE)];
    let mut atlas = backend.create_atlas(&layout).unwrap();
    backend.draw_atlas_row(&mut atlas, &scene, &layout, 0, &vpls).unwrap();

    let [mut previous, mut output] = backend.create_accumulators(size).unwrap();
    backend.clear_accum(&mut previous).unwrap();
    backend
        .accumulate_row(AccumulateRow {
            previous: &previous,
            output: &mut output,
            atlas: &atlas,
            gbuffer: &gbuffer,
            layout: &layout,
            row: 0,
            first_cell: 0,
            vpls: &vpls,
            flux: 1.0,
        })
        .unwrap();
    output.get_pixel(16, 16).0[0]
}

#[test]
fn test_single_vpl_irradiance_falls_with_height() {
    let heights = [0.5, 1.0, 2.0, 4.0, 8.0];
    let values: Vec<f32> = heights
        .iter()
        .map(|&h| single_triangle_irradiance(h, Vec3::Y))
        .collect();

    assert!(values[0] > 0.0, "{:?}", values);
    for pair in values.windows(2) {
        assert!(pair[1] > 0.0 && pair[1] < pair[0], "{:?}", values);
    }
}

#[test]
fn test_vpl_facing_the_triangle_sees_it_unoccluded() {
    // The triangle lands in the VPL's atlas cell and must not shadow itself.
    for height in [0.5, 2.0, 8.0] {
        let away = single_triangle_irradiance(height, Vec3::Y);
        let facing = single_triangle_irradiance(height, Vec3::NEG_Y);
        assert!(facing > 0.0);
        assert!((facing - away).abs() <= 1e-4 * away.max(1.0), "h={} {} vs {}", height, facing, away);
    }
}
