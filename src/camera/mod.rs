//! Cameras, projections and the arcball controller.

mod arcball;

pub use arcball::{ArcballController, ArcballMode, PointerButton, ROTATION_GAIN};

use serde::{Deserialize, Serialize};

use crate::util::{stable_up, Mat4, Vec3};

/// Pixel extent of the drawable area, passed into resize and frame calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Perspective or orthographic projection, wgpu clip conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        fov_y_degrees: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Projection::Perspective { fov_y_degrees, near, far } => {
                Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far)
            }
            Projection::Orthographic { left, right, bottom, top, near, far } => {
                Mat4::orthographic_rh(left, right, bottom, top, near, far)
            }
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }
}

/// Look-at camera. `up` is never parallel to `target - eye`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Camera {
    /// Build a camera, replacing `up` with a fixed world axis when it is
    /// parallel to the viewing direction.
    pub fn new(eye: Vec3, target: Vec3, up: Vec3, projection: Projection) -> Self {
        let dir = (target - eye).normalize_or_zero();
        let up = if dir.cross(up.normalize_or_zero()).length_squared() < 1e-8 {
            stable_up(dir)
        } else {
            up
        };
        Self { eye, target, up, projection }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

/// Matrices for one camera-space draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransforms {
    pub model_view: Mat4,
    pub projection: Mat4,
}

impl ViewTransforms {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.model_view
    }
}
