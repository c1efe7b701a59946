//! Final camera-space shading, shared by the software backend and
//! mirrored in `composite.wgsl`.

use image::{Rgba, RgbaImage};

use super::LightSpace;
use crate::pipeline::ShadowMode;
use crate::sampling::DiscKernel;
use crate::target::{
    decode_color, decode_depth, decode_position, decode_unit_vector, encode_color, is_background,
    sample_nearest,
};
use crate::util::{Vec2, Vec3};

pub const AMBIENT: f32 = 0.1;
pub const SHADOW_BIAS: f32 = 0.005;

pub const PCF_SAMPLES: usize = 16;
/// Filter radius in shadow-map texels.
pub const PCF_RADIUS_TEXELS: f32 = 1.5;

pub const RSM_SAMPLES: usize = 64;
/// Sampling radius in shadow-map texture space.
pub const RSM_RADIUS: f32 = 0.1;

/// Light-space targets available to the composite pass. Only depth exists
/// in SM mode.
#[derive(Clone, Copy)]
pub struct LightMaps<'a> {
    pub depth: &'a RgbaImage,
    pub normal: Option<&'a RgbaImage>,
    pub position: Option<&'a RgbaImage>,
    pub albedo: Option<&'a RgbaImage>,
}

pub struct ShadingInputs<'a> {
    pub mode: ShadowMode,
    pub light: &'a LightSpace,
    pub maps: LightMaps<'a>,
    pub kernel: &'a DiscKernel,
    pub scene_extent: f32,
    pub indirect_strength: f32,
}

/// Shade one surface point. `irradiance` is the ISM accumulation at the
/// pixel and is ignored outside ISM mode.
pub fn shade(
    inputs: &ShadingInputs<'_>,
    world: Vec3,
    normal: Vec3,
    albedo: Vec3,
    receive_shadow: bool,
    irradiance: Vec3,
) -> Vec3 {
    let to_light = (inputs.light.position - world).normalize_or_zero();
    let diffuse = normal.dot(to_light).max(0.0);
    let visibility = if receive_shadow {
        shadow_visibility(inputs, world)
    } else {
        1.0
    };

    let mut color = albedo * (AMBIENT + diffuse * visibility);
    match inputs.mode {
        ShadowMode::Sm => {}
        ShadowMode::Rsm => color += albedo * rsm_indirect(inputs, world, normal),
        ShadowMode::Ism => color += albedo * irradiance,
    }
    color
}

/// Fraction of the PCF taps that see `world` from the light.
pub fn shadow_visibility(inputs: &ShadingInputs<'_>, world: Vec3) -> f32 {
    let coord = inputs.light.shadow_matrix().project_point3(world);
    if coord.x < 0.0 || coord.x > 1.0 || coord.y < 0.0 || coord.y > 1.0 || coord.z > 1.0 {
        return 1.0;
    }

    let depth_map = inputs.maps.depth;
    let texel = Vec2::new(1.0 / depth_map.width() as f32, 1.0 / depth_map.height() as f32);
    let taps = inputs.kernel.first(PCF_SAMPLES);
    if taps.is_empty() {
        return 1.0;
    }

    let lit = taps
        .iter()
        .filter(|s| {
            let uv = coord.truncate() + **s * PCF_RADIUS_TEXELS * texel;
            coord.z - SHADOW_BIAS <= decode_depth(sample_nearest(depth_map, uv))
        })
        .count();
    lit as f32 / taps.len() as f32
}

/// One-bounce indirect light gathered from the reflective shadow map.
pub fn rsm_indirect(inputs: &ShadingInputs<'_>, world: Vec3, normal: Vec3) -> Vec3 {
    let (Some(normal_map), Some(position_map), Some(albedo_map)) =
        (inputs.maps.normal, inputs.maps.position, inputs.maps.albedo)
    else {
        return Vec3::ZERO;
    };

    let center = inputs.light.shadow_matrix().project_point3(world).truncate();
    let taps = inputs.kernel.first(RSM_SAMPLES);
    if taps.is_empty() {
        return Vec3::ZERO;
    }

    let mut sum = Vec3::ZERO;
    for s in taps {
        let uv = center + *s * RSM_RADIUS;
        if is_background(decode_depth(sample_nearest(inputs.maps.depth, uv))) {
            continue;
        }
        let p = decode_position(sample_nearest(position_map, uv), inputs.scene_extent);
        let n = decode_unit_vector(sample_nearest(normal_map, uv)).normalize_or_zero();
        let flux = decode_color(sample_nearest(albedo_map, uv));

        let d = world - p;
        let dist2 = d.length_squared();
        if dist2 < 1e-6 {
            continue;
        }
        let emit = n.dot(d).max(0.0);
        let receive = normal.dot(-d).max(0.0);
        sum += flux * (emit * receive / (dist2 * dist2)) * s.length_squared();
    }
    sum * (inputs.indirect_strength / taps.len() as f32)
}

pub fn to_rgba8(color: Vec3) -> Rgba<u8> {
    encode_color(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, Projection, ViewportSize};
    use crate::sampling::Seed;
    use crate::target::{encode_depth, encode_position, encode_unit_vector, BACKGROUND};

    fn overhead_light() -> LightSpace {
        let camera = Camera::new(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::ZERO,
            Vec3::Z,
            Projection::Orthographic {
                left: -4.0,
                right: 4.0,
                bottom: -4.0,
                top: 4.0,
                near: 0.0,
                far: 20.0,
            },
        );
        LightSpace::new(&camera, ViewportSize::new(16, 16))
    }

    fn kernel() -> DiscKernel {
        DiscKernel::generate(&mut Seed::Fixed(5).rng(), 256)
    }

    #[test]
    fn test_unshadowed_floor_is_lit() {
        let light = overhead_light();
        let depth = RgbaImage::from_pixel(16, 16, BACKGROUND);
        let kernel = kernel();
        let inputs = ShadingInputs {
            mode: ShadowMode::Sm,
            light: &light,
            maps: LightMaps { depth: &depth, normal: None, position: None, albedo: None },
            kernel: &kernel,
            scene_extent: 8.0,
            indirect_strength: 1.0,
        };
        assert_eq!(shadow_visibility(&inputs, Vec3::ZERO), 1.0);
        let c = shade(&inputs, Vec3::ZERO, Vec3::Y, Vec3::ONE, true, Vec3::ZERO);
        assert!((c.x - (AMBIENT + 1.0)).abs() < 1e-4);
    }

    #[test]
    fn test_occluder_darkens_receiver_only() {
        let light = overhead_light();
        // Occluder at y = 5, i.e. depth 0.25 across the whole map
        let depth = RgbaImage::from_pixel(16, 16, encode_depth(0.25));
        let kernel = kernel();
        let inputs = ShadingInputs {
            mode: ShadowMode::Sm,
            light: &light,
            maps: LightMaps { depth: &depth, normal: None, position: None, albedo: None },
            kernel: &kernel,
            scene_extent: 8.0,
            indirect_strength: 1.0,
        };
        assert_eq!(shadow_visibility(&inputs, Vec3::ZERO), 0.0);
        let shadowed = shade(&inputs, Vec3::ZERO, Vec3::Y, Vec3::ONE, true, Vec3::ZERO);
        let caster = shade(&inputs, Vec3::ZERO, Vec3::Y, Vec3::ONE, false, Vec3::ZERO);
        assert!((shadowed.x - AMBIENT).abs() < 1e-4);
        assert!(caster.x > shadowed.x);
    }

    #[test]
    fn test_ism_mode_adds_irradiance() {
        let light = overhead_light();
        let depth = RgbaImage::from_pixel(16, 16, BACKGROUND);
        let kernel = kernel();
        let mut inputs = ShadingInputs {
            mode: ShadowMode::Sm,
            light: &light,
            maps: LightMaps { depth: &depth, normal: None, position: None, albedo: None },
            kernel: &kernel,
            scene_extent: 8.0,
            indirect_strength: 1.0,
        };
        let albedo = Vec3::new(0.5, 0.5, 0.5);
        let extra = Vec3::new(0.2, 0.0, 0.0);
        let sm = shade(&inputs, Vec3::ZERO, Vec3::Y, albedo, true, extra);
        inputs.mode = ShadowMode::Ism;
        let ism = shade(&inputs, Vec3::ZERO, Vec3::Y, albedo, true, extra);
        assert!((ism.x - sm.x - 0.1).abs() < 1e-5);
        assert_eq!(ism.y, sm.y);
    }

    #[test]
    fn test_rsm_gathers_from_facing_wall() {
        let light = overhead_light();
        // Every texel claims a red wall point at x = -1 facing +X
        let wall = Vec3::new(-1.0, 0.5, 0.0);
        let depth = RgbaImage::from_pixel(16, 16, encode_depth(0.5));
        let normal = RgbaImage::from_pixel(16, 16, encode_unit_vector(Vec3::X));
        let position = RgbaImage::from_pixel(16, 16, encode_position(wall, 8.0));
        let albedo = RgbaImage::from_pixel(16, 16, encode_color(Vec3::X));
        let kernel = kernel();
        let inputs = ShadingInputs {
            mode: ShadowMode::Rsm,
            light: &light,
            maps: LightMaps {
                depth: &depth,
                normal: Some(&normal),
                position: Some(&position),
                albedo: Some(&albedo),
            },
            kernel: &kernel,
            scene_extent: 8.0,
            indirect_strength: 1.0,
        };
        let facing = rsm_indirect(&inputs, Vec3::ZERO, Vec3::NEG_X);
        assert!(facing.x > 0.0);
        assert_eq!(facing.y, 0.0);
        // Behind the wall's emitting side
        let behind = rsm_indirect(&inputs, Vec3::new(-2.0, 0.5, 0.0), Vec3::X);
        assert_eq!(behind, Vec3::ZERO);
    }
}
