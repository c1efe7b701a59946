//! VPL placement by rejection sampling of light-space images.

use image::RgbaImage;
use rand::Rng;

use super::Vpl;
use crate::target::{decode_color, decode_depth, decode_unit_vector, is_background};
use crate::util::{Mat4, Vec3};

/// Decoded-on-demand light-space G-buffer.
pub struct LightSpaceImages<'a> {
    pub depth: &'a RgbaImage,
    pub normal: &'a RgbaImage,
    pub albedo: &'a RgbaImage,
    /// Inverse of the light's projection × view.
    pub inverse_view_projection: Mat4,
}

/// Result of a capped rejection run.
#[derive(Debug, Clone)]
pub struct RejectionOutcome {
    pub vpls: Vec<Vpl>,
    pub attempts: usize,
}

impl RejectionOutcome {
    pub fn is_complete(&self, target: usize) -> bool {
        self.vpls.len() >= target
    }
}

/// Draw random texels until `target` VPLs are accepted or `max_attempts`
/// texels have been tried.
///
/// Background texels (depth at the far plane) and texels without a normal
/// are rejected. Position is reconstructed from depth through the inverse
/// light transform. Hitting the cap returns the partial set.
pub fn sample_rejection<R: Rng + ?Sized>(
    images: &LightSpaceImages<'_>,
    target: usize,
    max_attempts: usize,
    rng: &mut R,
) -> RejectionOutcome {
    let (w, h) = images.depth.dimensions();
    let mut vpls = Vec::with_capacity(target);
    let mut attempts = 0;

    if w == 0 || h == 0 {
        return RejectionOutcome { vpls, attempts };
    }

    while vpls.len() < target && attempts < max_attempts {
        attempts += 1;
        let x = rng.gen_range(0..w);
        let y = rng.gen_range(0..h);

        let depth = decode_depth(*images.depth.get_pixel(x, y));
        if is_background(depth) {
            continue;
        }
        let normal = decode_unit_vector(*images.normal.get_pixel(x, y));
        if normal.length_squared() < 1e-4 {
            continue;
        }

        let ndc = Vec3::new(
            2.0 * (x as f32 + 0.5) / w as f32 - 1.0,
            1.0 - 2.0 * (y as f32 + 0.5) / h as f32,
            depth,
        );
        let position = images.inverse_view_projection.project_point3(ndc);
        if !position.is_finite() {
            continue;
        }

        let albedo = decode_color(*images.albedo.get_pixel(x, y));
        vpls.push(Vpl::new(position, normal, albedo));
    }

    if vpls.len() < target {
        log::warn!(
            "VPL rejection sampling stopped after {} attempts with {} of {} VPLs",
            attempts,
            vpls.len(),
            target
        );
    }

    RejectionOutcome { vpls, attempts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{encode_color, encode_depth, encode_unit_vector, BACKGROUND};
    use image::Rgba;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_images(depth: Rgba<u8>) -> (RgbaImage, RgbaImage, RgbaImage) {
        (
            RgbaImage::from_pixel(8, 8, depth),
            RgbaImage::from_pixel(8, 8, encode_unit_vector(Vec3::Y)),
            RgbaImage::from_pixel(8, 8, encode_color(Vec3::new(1.0, 0.0, 0.0))),
        )
    }

    #[test]
    fn test_all_background_returns_partial_set() {
        let (d, n, a) = flat_images(BACKGROUND);
        let images = LightSpaceImages {
            depth: &d,
            normal: &n,
            albedo: &a,
            inverse_view_projection: Mat4::IDENTITY,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = sample_rejection(&images, 64, 500, &mut rng);
        assert!(outcome.vpls.is_empty());
        assert_eq!(outcome.attempts, 500);
        assert!(!outcome.is_complete(64));
    }

    #[test]
    fn test_reconstructs_positions_on_plane() {
        let (d, n, a) = flat_images(encode_depth(0.25));
        let light_vp = Mat4::orthographic_rh(-4.0, 4.0, -4.0, 4.0, 0.0, 8.0)
            * Mat4::look_at_rh(Vec3::new(0.0, 8.0, 0.0), Vec3::ZERO, Vec3::Z);
        let images = LightSpaceImages {
            depth: &d,
            normal: &n,
            albedo: &a,
            inverse_view_projection: light_vp.inverse(),
        };
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = sample_rejection(&images, 16, 1000, &mut rng);
        assert!(outcome.is_complete(16));
        for vpl in &outcome.vpls {
            // depth 0.25 of an 8-unit range below a light at y = 8
            assert!((vpl.position.y - 6.0).abs() < 1e-3);
            assert!(vpl.position.x.abs() <= 4.0 && vpl.position.z.abs() <= 4.0);
            assert!((vpl.albedo - Vec3::X).length() < 1e-6);
            assert!((vpl.normal - Vec3::Y).length() < 0.02);
        }
    }
}
