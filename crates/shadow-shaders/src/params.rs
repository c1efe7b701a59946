//! GPU uniform and storage layouts.
//!
//! Every struct mirrors a WGSL struct and packs scalars into `Vec4` so the
//! std140/std430 layouts agree without manual padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Number of disc samples the composite kernel uniform holds.
pub const KERNEL_CAPACITY: usize = 256;

/// `light_pass.wgsl` uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightPassUniform {
    pub view_proj: Mat4,
    /// x = draw mode, y = scene extent
    pub params: Vec4,
}

impl LightPassUniform {
    pub fn new(view_proj: Mat4, draw_mode: u32, scene_extent: f32) -> Self {
        Self {
            view_proj,
            params: Vec4::new(draw_mode as f32, scene_extent, 0.0, 0.0),
        }
    }
}

/// `gbuffer.wgsl` camera uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: Mat4,
}

/// One VPL as stored in the shared storage buffer, indexed by atlas cell.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuVpl {
    pub view_proj: Mat4,
    pub eye: Vec4,
    pub position: Vec4,
    pub normal: Vec4,
    pub albedo: Vec4,
}

impl GpuVpl {
    pub fn new(view_proj: Mat4, eye: Vec3, position: Vec3, normal: Vec3, albedo: Vec3) -> Self {
        Self {
            view_proj,
            eye: eye.extend(1.0),
            position: position.extend(1.0),
            normal: normal.extend(0.0),
            albedo: albedo.extend(1.0),
        }
    }
}

/// `ism_atlas.wgsl` per-row uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AtlasRowUniform {
    /// x = cols, y = rows, z = first cell, w = VPL far plane
    pub grid: Vec4,
}

/// `accumulate.wgsl` per-row uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AccumulateUniform {
    /// x = cols, y = rows, z = first cell, w = cell size
    pub grid: Vec4,
    /// x = VPLs in the row, y = flux per VPL, z = VPL far plane, w = depth bias
    pub params: Vec4,
}

/// `composite.wgsl` frame uniform.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CompositeUniform {
    pub view_proj: Mat4,
    pub shadow_matrix: Mat4,
    pub light_position: Vec4,
    /// x = scene extent, y = indirect strength, z = kernel length
    pub params: Vec4,
}

/// Disc kernel, two samples per `Vec4`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct KernelUniform {
    pub samples: [Vec4; KERNEL_CAPACITY / 2],
}

impl KernelUniform {
    /// Pack up to [`KERNEL_CAPACITY`] samples; returns the uniform and the
    /// number packed.
    pub fn pack(samples: &[Vec2]) -> (Self, usize) {
        let mut out = Self::zeroed();
        let len = samples.len().min(KERNEL_CAPACITY);
        for (i, s) in samples[..len].iter().enumerate() {
            let slot = &mut out.samples[i / 2];
            if i % 2 == 0 {
                slot.x = s.x;
                slot.y = s.y;
            } else {
                slot.z = s.x;
                slot.w = s.y;
            }
        }
        (out, len)
    }
}

/// Per-draw flags for the composite pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawUniform {
    /// x = receives shadow
    pub flags: Vec4,
}

impl DrawUniform {
    pub fn new(receive_shadow: bool) -> Self {
        Self {
            flags: Vec4::new(if receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_packing() {
        let samples = [Vec2::new(0.1, 0.2), Vec2::new(0.3, 0.4), Vec2::new(0.5, 0.6)];
        let (k, len) = KernelUniform::pack(&samples);
        assert_eq!(len, 3);
        assert_eq!(k.samples[0], Vec4::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(k.samples[1], Vec4::new(0.5, 0.6, 0.0, 0.0));
    }

    #[test]
    fn test_kernel_capacity() {
        let samples = vec![Vec2::ONE; KERNEL_CAPACITY + 10];
        let (_, len) = KernelUniform::pack(&samples);
        assert_eq!(len, KERNEL_CAPACITY);
    }
}
