//! The rendered scene: one object and one shadow receiver.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{GeometryBuffer, CHECKER_COLOR_A, CHECKER_COLOR_B, DEFAULT_SURFACE_COLOR};
use crate::util::{Error, Result, Vec3};

/// Which procedural geometry receives shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReceiverKind {
    #[default]
    ColorBox,
    CheckerFloor,
}

impl FromStr for ReceiverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "box" | "colorbox" => Ok(ReceiverKind::ColorBox),
            "checker" | "floor" => Ok(ReceiverKind::CheckerFloor),
            other => Err(Error::other(format!("unknown receiver '{}' (expected box or checker)", other))),
        }
    }
}

/// One draw of the composite pass.
#[derive(Clone, Copy)]
pub struct DrawItem<'a> {
    pub geometry: &'a GeometryBuffer,
    pub receive_shadow: bool,
}

/// Object plus receiver. Light and geometry never change after load.
#[derive(Clone, Debug)]
pub struct Scene {
    pub object: GeometryBuffer,
    pub receiver: GeometryBuffer,
}

impl Scene {
    pub fn new(object: GeometryBuffer, receiver: GeometryBuffer) -> Self {
        Self { object, receiver }
    }

    /// Load the object from a surface file, or fall back to a unit cube.
    pub fn load(object_path: Option<&Path>, receiver: ReceiverKind) -> Result<Self> {
        let object = match object_path {
            Some(path) => GeometryBuffer::from_surface_file(path, DEFAULT_SURFACE_COLOR)?,
            None => GeometryBuffer::cube(Vec3::ZERO, 1.0, DEFAULT_SURFACE_COLOR),
        };
        Ok(Self::new(object, Self::build_receiver(receiver)))
    }

    pub fn build_receiver(kind: ReceiverKind) -> GeometryBuffer {
        match kind {
            ReceiverKind::ColorBox => GeometryBuffer::color_box(5.0, -1.0),
            ReceiverKind::CheckerFloor => {
                GeometryBuffer::checker_floor(Vec3::Y, 1.0, 1.0, 10, 10, CHECKER_COLOR_A, CHECKER_COLOR_B)
            }
        }
    }

    /// Composite draw order: object first, then the shadow receiver.
    pub fn draws(&self) -> [DrawItem<'_>; 2] {
        [
            DrawItem { geometry: &self.object, receive_shadow: false },
            DrawItem { geometry: &self.receiver, receive_shadow: true },
        ]
    }

    /// Geometry rendered into light-space and atlas targets.
    pub fn casters(&self) -> [&GeometryBuffer; 2] {
        [&self.receiver, &self.object]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_names() {
        assert_eq!("box".parse::<ReceiverKind>().unwrap(), ReceiverKind::ColorBox);
        assert_eq!("Checker".parse::<ReceiverKind>().unwrap(), ReceiverKind::CheckerFloor);
        assert!("sphere".parse::<ReceiverKind>().is_err());
    }

    #[test]
    fn test_draw_order_and_flags() {
        let scene = Scene::load(None, ReceiverKind::CheckerFloor).unwrap();
        let draws = scene.draws();
        assert!(!draws[0].receive_shadow);
        assert!(draws[1].receive_shadow);
        assert_eq!(draws[0].geometry.triangle_count(), 12);
    }

    #[test]
    fn test_missing_object_file_fails() {
        let err = Scene::load(Some(Path::new("/nonexistent/mesh.obj")), ReceiverKind::ColorBox).unwrap_err();
        assert!(matches!(err, crate::util::Error::FileOpen { .. }));
    }
}
