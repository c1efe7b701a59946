//! Imperfect shadow map lookups and per-VPL irradiance.

use image::{Rgba, RgbaImage};

use crate::sampling::Vpl;
use crate::target::{decode_depth, encode_depth, is_background, AtlasLayout};
use crate::util::{Mat4, Vec2, Vec3};

pub const VPL_FOV_DEGREES: f32 = 120.0;
pub const VPL_NEAR: f32 = 0.01;
pub const VPL_FAR: f32 = 20.0;

/// Depth slack in world units before a receiver counts as occluded.
pub const ISM_BIAS: f32 = 0.05;

/// Keeps the inverse-square falloff finite at the VPL.
pub const ISM_EPSILON: f32 = 0.01;

pub fn vpl_projection() -> Mat4 {
    Mat4::perspective_rh(VPL_FOV_DEGREES.to_radians(), 1.0, VPL_NEAR, VPL_FAR)
}

pub fn vpl_view_projection(vpl: &Vpl) -> Mat4 {
    vpl_projection() * vpl.view()
}

/// Value stored in an atlas cell for a surface point seen by `vpl`.
pub fn encode_vpl_distance(vpl: &Vpl, world: Vec3) -> Rgba<u8> {
    encode_depth(world.distance(vpl.eye()) / VPL_FAR)
}

/// Cell uv of `world` as seen by `vpl`, or `None` outside its frustum.
pub fn project_to_cell(vpl: &Vpl, world: Vec3) -> Option<Vec2> {
    let clip = vpl_view_projection(vpl) * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some(Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5))
}

/// 1.0 when `world` is unoccluded from VPL `cell`, else 0.0.
pub fn cell_visibility(
    atlas: &RgbaImage,
    layout: &AtlasLayout,
    cell: usize,
    vpl: &Vpl,
    world: Vec3,
) -> f32 {
    let Some(uv) = project_to_cell(vpl, world) else {
        return 1.0;
    };
    let (x, y) = layout.cell_rect(cell).texel(uv);
    let stored = decode_depth(*atlas.get_pixel(x, y));
    if is_background(stored) {
        return 1.0;
    }
    let distance = world.distance(vpl.eye()) / VPL_FAR;
    if distance - ISM_BIAS / VPL_FAR <= stored {
        1.0
    } else {
        0.0
    }
}

/// Irradiance one isotropic VPL of power `flux` delivers to a receiver
/// at `world` with unit normal `normal`.
pub fn vpl_contribution(vpl: &Vpl, world: Vec3, normal: Vec3, visibility: f32, flux: f32) -> Vec3 {
    let to_vpl = vpl.position - world;
    let cos = normal.dot(to_vpl.normalize_or_zero()).max(0.0);
    vpl.albedo * (flux * cos * visibility / (to_vpl.length_squared() + ISM_EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::BACKGROUND;

    fn floor_vpl(height: f32) -> Vpl {
        Vpl::new(Vec3::new(0.0, height, 0.0), Vec3::NEG_Y, Vec3::ONE)
    }

    #[test]
    fn test_point_ahead_projects_to_cell_center() {
        let vpl = floor_vpl(2.0);
        let uv = project_to_cell(&vpl, Vec3::ZERO).unwrap();
        assert!((uv - Vec2::splat(0.5)).length() < 1e-4);
    }

    #[test]
    fn test_point_behind_is_outside_frustum() {
        let vpl = floor_vpl(2.0);
        assert!(project_to_cell(&vpl, Vec3::new(0.0, 5.0, 0.0)).is_none());
    }

    #[test]
    fn test_visibility_against_stored_distance() {
        let layout = AtlasLayout::new(1, 2, 4).unwrap();
        let vpl = floor_vpl(2.0);
        let mut atlas = RgbaImage::from_pixel(8, 4, BACKGROUND);
        assert_eq!(cell_visibility(&atlas, &layout, 1, &vpl, Vec3::ZERO), 1.0);

        // Occluder at half the distance fills cell 1
        let occluder = encode_vpl_distance(&vpl, Vec3::new(0.0, 1.0, 0.0));
        for y in 0..4 {
            for x in 4..8 {
                atlas.put_pixel(x, y, occluder);
            }
        }
        assert_eq!(cell_visibility(&atlas, &layout, 1, &vpl, Vec3::ZERO), 0.0);
        assert_eq!(cell_visibility(&atlas, &layout, 1, &vpl, Vec3::new(0.0, 1.0, 0.0)), 1.0);
        // Cell 0 is still empty
        assert_eq!(cell_visibility(&atlas, &layout, 0, &vpl, Vec3::ZERO), 1.0);
    }

    #[test]
    fn test_contribution_falls_off_with_distance() {
        let near = vpl_contribution(&floor_vpl(1.0), Vec3::ZERO, Vec3::Y, 1.0, 1.0);
        let far = vpl_contribution(&floor_vpl(2.0), Vec3::ZERO, Vec3::Y, 1.0, 1.0);
        assert!(near.x > far.x && far.x > 0.0);
        let occluded = vpl_contribution(&floor_vpl(1.0), Vec3::ZERO, Vec3::Y, 0.0, 1.0);
        assert_eq!(occluded, Vec3::ZERO);
    }

    #[test]
    fn test_backfacing_receiver_gets_nothing() {
        let c = vpl_contribution(&floor_vpl(1.0), Vec3::ZERO, Vec3::NEG_Y, 1.0, 1.0);
        assert_eq!(c, Vec3::ZERO);
    }
}
