//! Area-proportional VPL placement directly on mesh triangles.

use rand::Rng;

use super::Vpl;
use crate::geom::GeometryBuffer;

/// Reflect a pair of uniform draws into the lower-left barycentric
/// triangle so that `r1, r2 >= 0` and `r1 + r2 <= 1`.
pub fn fold_barycentric(r1: f32, r2: f32) -> (f32, f32) {
    if r1 + r2 > 1.0 {
        (1.0 - r1, 1.0 - r2)
    } else {
        (r1, r2)
    }
}

/// Samples for a triangle of `area`: `max(1, round(area / max_area))`.
/// A non-positive `max_area_per_sample` yields one sample.
pub fn surface_sample_count(area: f32, max_area_per_sample: f32) -> usize {
    if max_area_per_sample <= 0.0 {
        return 1;
    }
    ((area / max_area_per_sample).round() as usize).max(1)
}

/// Place VPLs on every triangle proportionally to its area.
///
/// Degenerate triangles have no surface to light and are skipped.
pub fn sample_surface<R: Rng + ?Sized>(
    geometries: &[&GeometryBuffer],
    max_area_per_sample: f32,
    rng: &mut R,
) -> Vec<Vpl> {
    let mut vpls = Vec::new();

    for geom in geometries {
        for (t, tri) in geom.triangles().iter().enumerate() {
            let [a, b, c] = geom.triangle_positions(t);
            let area = 0.5 * (b - a).cross(c - a).length();
            if area <= 0.0 {
                continue;
            }

            let [ia, ib, ic] = tri.map(|i| i as usize);
            for _ in 0..surface_sample_count(area, max_area_per_sample) {
                let (r1, r2) = fold_barycentric(rng.gen(), rng.gen());
                let r0 = 1.0 - r1 - r2;

                let position = a + r1 * (b - a) + r2 * (c - a);
                let normals = geom.normals();
                let normal = r0 * normals[ia] + r1 * normals[ib] + r2 * normals[ic];
                let colors = geom.colors();
                let albedo = r0 * colors[ia] + r1 * colors[ib] + r2 * colors[ic];
                vpls.push(Vpl::new(position, normal, albedo));
            }
        }
    }

    log::debug!("Surface sampling placed {} VPLs", vpls.len());
    vpls
}
