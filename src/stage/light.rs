use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, ViewportSize};
use crate::raster::Fragment;
use crate::target::{encode_color, encode_depth, encode_position, encode_unit_vector, BACKGROUND};
use crate::util::{Mat4, Vec3, BIAS_MATRIX};

/// What a light-space sub-pass writes into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawMode {
    Depth,
    Normal,
    Position,
    Albedo,
}

impl DrawMode {
    pub const ALL: [DrawMode; 4] = [
        DrawMode::Depth,
        DrawMode::Normal,
        DrawMode::Position,
        DrawMode::Albedo,
    ];

    /// Slot in the light target array, also the shader's mode uniform.
    pub fn index(self) -> usize {
        match self {
            DrawMode::Depth => 0,
            DrawMode::Normal => 1,
            DrawMode::Position => 2,
            DrawMode::Albedo => 3,
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            DrawMode::Depth => "depth",
            DrawMode::Normal => "normal",
            DrawMode::Position => "position",
            DrawMode::Albedo => "albedo",
        }
    }

    pub fn clear_color(self) -> Rgba<u8> {
        match self {
            DrawMode::Depth => BACKGROUND,
            _ => Rgba([0, 0, 0, 255]),
        }
    }

    pub fn encode(self, fragment: &Fragment, scene_extent: f32) -> Rgba<u8> {
        match self {
            DrawMode::Depth => encode_depth(fragment.depth),
            DrawMode::Normal => encode_unit_vector(fragment.normal.normalize_or_zero()),
            DrawMode::Position => encode_position(fragment.world, scene_extent),
            DrawMode::Albedo => encode_color(fragment.color),
        }
    }
}

/// The light's transforms, fixed for the life of a scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl LightSpace {
    pub fn new(camera: &Camera, size: ViewportSize) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection.matrix(size.aspect()),
            position: camera.eye,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn inverse_view_projection(&self) -> Mat4 {
        self.view_projection().inverse()
    }

    /// World to shadow-map texture space: xy in [0, 1] with v down, z depth.
    pub fn shadow_matrix(&self) -> Mat4 {
        BIAS_MATRIX * self.view_projection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use crate::target::{decode_depth, decode_position};

    fn test_light() -> LightSpace {
        let camera = Camera::new(
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
        );
        LightSpace::new(&camera, ViewportSize::new(1024, 1024))
    }

    #[test]
    fn test_shadow_matrix_maps_target_to_center() {
        let light = test_light();
        let p = light.shadow_matrix().project_point3(Vec3::ZERO);
        assert!((p.x - 0.5).abs() < 1e-5);
        assert!((p.y - 0.5).abs() < 1e-5);
        let dist = Vec3::new(2.0, 8.0, 10.0).length();
        assert!((p.z - dist / 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_shadow_matrix_flips_v() {
        let light = test_light();
        // A point above the target projects to the upper half of the texture
        let up = light.shadow_matrix().project_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!(up.y < 0.5);
    }

    #[test]
    fn test_inverse_round_trip() {
        let light = test_light();
        let p = Vec3::new(1.0, -0.5, 2.0);
        let ndc = light.view_projection().project_point3(p);
        let back = light.inverse_view_projection().project_point3(ndc);
        assert!((back - p).length() < 1e-4);
    }

    #[test]
    fn test_fragment_encodings() {
        let fragment = Fragment {
            x: 0,
            y: 0,
            depth: 0.375,
            world: Vec3::new(1.0, 2.0, -3.0),
            normal: Vec3::new(0.0, 2.0, 0.0),
            color: Vec3::new(0.2, 0.4, 0.6),
        };
        assert!((decode_depth(DrawMode::Depth.encode(&fragment, 8.0)) - 0.375).abs() < 1e-6);
        assert_eq!(DrawMode::Normal.encode(&fragment, 8.0), encode_unit_vector(Vec3::Y));
        let p = decode_position(DrawMode::Position.encode(&fragment, 8.0), 8.0);
        assert!((p - fragment.world).abs().max_element() < 0.05);
        assert_eq!(DrawMode::Depth.clear_color(), BACKGROUND);
    }

    #[test]
    fn test_mode_slots_are_distinct() {
        let mut seen = [false; 4];
        for mode in DrawMode::ALL {
            assert!(!seen[mode.index()]);
            seen[mode.index()] = true;
        }
    }
}
