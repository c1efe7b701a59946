//! Math type re-exports and shadow-space helpers.

pub use glam::{Mat4, Vec2, Vec3, Vec4};

/// Maps clip-space x/y in [-1, 1] to texture space [0, 1].
///
/// Texture v grows downward, so y is flipped. Depth is already [0, 1]
/// under wgpu clip conventions and passes through.
pub const BIAS_MATRIX: Mat4 = Mat4::from_cols_array(&[
    0.5, 0.0, 0.0, 0.0,
    0.0, -0.5, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.5, 0.5, 0.0, 1.0,
]);

/// Pick a world axis that is not parallel to `dir` for use as look-at up.
pub fn stable_up(dir: Vec3) -> Vec3 {
    let d = dir.normalize_or_zero();
    if d.dot(Vec3::Y).abs() > 0.99 {
        Vec3::X
    } else {
        Vec3::Y
    }
}
