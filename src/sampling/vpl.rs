use crate::util::{stable_up, Mat4, Vec3};

/// Distance the VPL eye sits above its surface point.
pub const VPL_NORMAL_OFFSET: f32 = 0.01;

/// Virtual point light: a surface point re-emitting direct light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vpl {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
    view: Mat4,
}

impl Vpl {
    /// A zero normal falls back to +Y so the view matrix stays finite.
    pub fn new(position: Vec3, normal: Vec3, albedo: Vec3) -> Self {
        let normal = match normal.normalize_or_zero() {
            n if n == Vec3::ZERO => Vec3::Y,
            n => n,
        };
        let eye = position + normal * VPL_NORMAL_OFFSET;
        let view = Mat4::look_at_rh(eye, position + normal, stable_up(normal));
        Self {
            position,
            normal,
            albedo,
            view,
        }
    }

    /// Looks from just above the surface along the outward normal.
    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn eye(&self) -> Vec3 {
        self.position + self.normal * VPL_NORMAL_OFFSET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_looks_along_normal() {
        for normal in [Vec3::Y, -Vec3::Y, Vec3::X, Vec3::new(0.3, 0.2, -0.9)] {
            let vpl = Vpl::new(Vec3::new(1.0, 2.0, 3.0), normal, Vec3::ONE);
            assert!(vpl.view().is_finite());
            // Camera looks down -Z in view space
            let ahead = vpl.view().transform_point3(vpl.position + vpl.normal * 2.0);
            assert!(ahead.z < 0.0);
            assert!(ahead.x.abs() < 1e-4 && ahead.y.abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_normal_falls_back() {
        let vpl = Vpl::new(Vec3::ZERO, Vec3::ZERO, Vec3::ONE);
        assert_eq!(vpl.normal, Vec3::Y);
        assert!(vpl.view().is_finite());
    }
}
