//! Arcball controller: pointer drags to rotation, pan and zoom.
//!
//! Pointer positions are in pixels with y growing downward. Rotation maps
//! both pointer positions onto a virtual hemisphere and rotates by the arc
//! between them; translation and zoom come from pixel deltas normalized by
//! the viewport size.

use super::{Camera, Projection, ViewTransforms, ViewportSize};
use crate::util::{Mat4, Vec2, Vec3};

/// Angle multiplier for hemisphere rotations.
pub const ROTATION_GAIN: f32 = 4.0;
const TRANSLATE_SENSITIVITY: f32 = 10.0;
const SCALE_SENSITIVITY: f32 = 20.0;
const WHEEL_SENSITIVITY: f32 = 1.0 / 1000.0;
const ZOOM_FACTOR: f32 = 0.1;

/// Pointer buttons the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Tertiary,
}

/// Current drag interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArcballMode {
    #[default]
    None,
    Rotate,
    Translate,
    Scale,
}

impl From<PointerButton> for ArcballMode {
    fn from(button: PointerButton) -> Self {
        match button {
            PointerButton::Primary => ArcballMode::Rotate,
            PointerButton::Secondary => ArcballMode::Translate,
            PointerButton::Tertiary => ArcballMode::Scale,
        }
    }
}

/// Accumulated arcball state on top of a fixed look-at camera.
#[derive(Debug, Clone)]
pub struct ArcballController {
    camera: Camera,
    viewport: ViewportSize,
    mode: ArcballMode,
    old_point: Vec2,
    new_point: Vec2,
    rotation: Mat4,
    translation: Vec3,
    zoom: f32,
}

impl ArcballController {
    pub fn new(camera: Camera, viewport: ViewportSize) -> Self {
        Self {
            camera,
            viewport,
            mode: ArcballMode::None,
            old_point: Vec2::ZERO,
            new_point: Vec2::ZERO,
            rotation: Mat4::IDENTITY,
            translation: Vec3::ZERO,
            zoom: 0.0,
        }
    }

    pub fn resize(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn mode(&self) -> ArcballMode {
        self.mode
    }

    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Start a drag at `pointer`; the button selects the mode.
    pub fn begin_drag(&mut self, pointer: Vec2, button: PointerButton) {
        self.mode = button.into();
        self.old_point = pointer;
        self.new_point = pointer;
    }

    /// Apply the delta from the previous pointer position.
    pub fn drag(&mut self, pointer: Vec2) {
        self.new_point = pointer;
        match self.mode {
            ArcballMode::Rotate => self.update_rotate(),
            ArcballMode::Translate => self.update_translate(),
            ArcballMode::Scale => self.update_scale(),
            ArcballMode::None => {}
        }
        self.old_point = self.new_point;
    }

    pub fn end_drag(&mut self) {
        self.mode = ArcballMode::None;
    }

    /// Wheel zoom, independent of the drag mode.
    pub fn scroll(&mut self, delta: f32) {
        self.zoom += delta * WHEEL_SENSITIVITY;
    }

    /// Drop all accumulated rotation, translation and zoom.
    pub fn reset(&mut self) {
        self.rotation = Mat4::IDENTITY;
        self.translation = Vec3::ZERO;
        self.zoom = 0.0;
        self.mode = ArcballMode::None;
    }

    /// Accumulated rotation composed with the zoom scale.
    pub fn model_matrix(&self) -> Mat4 {
        self.rotation * Mat4::from_scale(Vec3::splat(1.0 - self.zoom * ZOOM_FACTOR))
    }

    /// Fixed look-at view followed by the view-space translation.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation) * self.camera.view_matrix()
    }

    pub fn model_view_matrix(&self) -> Mat4 {
        self.view_matrix() * self.model_matrix()
    }

    pub fn projection(&self) -> Projection {
        self.camera.projection
    }

    pub fn transforms(&self) -> ViewTransforms {
        ViewTransforms {
            model_view: self.model_view_matrix(),
            projection: self.camera.projection.matrix(self.viewport.aspect()),
        }
    }

    /// Map a pixel position onto the unit hemisphere facing the viewer.
    ///
    /// Inside the unit disk z is lifted onto the sphere; outside, the 2D
    /// vector is normalized onto the rim with z = 0.
    pub fn hemisphere_point(&self, pointer: Vec2) -> Vec3 {
        let w = self.viewport.width.max(1) as f32;
        let h = self.viewport.height.max(1) as f32;
        let x = 2.0 * pointer.x / w - 1.0;
        let y = -2.0 * pointer.y / h + 1.0;

        let xy_squared = x * x + y * y;
        if xy_squared <= 1.0 {
            Vec3::new(x, y, (1.0 - xy_squared).sqrt())
        } else {
            Vec3::new(x, y, 0.0).normalize_or_zero()
        }
    }

    fn update_rotate(&mut self) {
        let u = self.hemisphere_point(self.new_point);
        let v = self.hemisphere_point(self.old_point);

        let axis = v.cross(u);
        if axis.length_squared() <= f32::EPSILON * f32::EPSILON {
            return;
        }
        let angle = u.dot(v).clamp(-1.0, 1.0).acos();

        // Axis is in camera space; the running rotation is object to camera
        let object_axis = self.rotation.inverse().transform_vector3(axis).normalize_or_zero();
        if object_axis == Vec3::ZERO {
            return;
        }
        self.rotation *= Mat4::from_axis_angle(object_axis, ROTATION_GAIN * angle);
    }

    fn update_translate(&mut self) {
        let delta = self.new_point - self.old_point;
        let dx = TRANSLATE_SENSITIVITY * delta.x / self.viewport.width.max(1) as f32;
        let dy = TRANSLATE_SENSITIVITY * delta.y / self.viewport.height.max(1) as f32;
        self.translation += Vec3::new(dx, -dy, 0.0);
    }

    fn update_scale(&mut self) {
        let dy = self.new_point.y - self.old_point.y;
        self.zoom += SCALE_SENSITIVITY * dy / self.viewport.height.max(1) as f32;
    }
}
