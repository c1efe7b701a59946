//! Triangle meshes with per-vertex attributes.
//!
//! A [`GeometryBuffer`] holds parallel position/normal/color sequences and a
//! triangle index list. It is immutable once built: procedural builders and
//! the surface-file loader produce a finished buffer with normals computed.

mod procedural;
mod scene;
mod surface;

pub use procedural::{CHECKER_COLOR_A, CHECKER_COLOR_B};
pub use scene::{DrawItem, ReceiverKind, Scene};
pub use surface::DEFAULT_SURFACE_COLOR;

use crate::util::Vec3;

/// Triangulated surface with per-vertex normals and colors.
#[derive(Clone, Debug, Default)]
pub struct GeometryBuffer {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl GeometryBuffer {
    /// Build a buffer from positions, colors and triangles and compute
    /// vertex normals.
    ///
    /// Callers guarantee every index is below `positions.len()` and that
    /// `colors` matches `positions` in length.
    pub(crate) fn from_parts(positions: Vec<Vec3>, colors: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        debug_assert_eq!(positions.len(), colors.len());
        debug_assert!(triangles.iter().flatten().all(|&i| (i as usize) < positions.len()));

        let normals = face_count_normals(&positions, &triangles);
        Self {
            positions,
            normals,
            colors,
            triangles,
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Corner positions of triangle `index`.
    pub fn triangle_positions(&self, index: usize) -> [Vec3; 3] {
        self.triangles[index].map(|i| self.positions[i as usize])
    }
}

/// Average of normalized face normals over incident faces.
///
/// Each face contributes with weight 1 regardless of its area or corner
/// angle. Vertices without faces keep a zero normal.
fn face_count_normals(positions: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut sums = vec![Vec3::ZERO; positions.len()];
    let mut counts = vec![0u32; positions.len()];

    for tri in triangles {
        let [a, b, c] = tri.map(|i| positions[i as usize]);
        let face = (b - a).cross(c - a).normalize_or_zero();
        for &i in tri {
            sums[i as usize] += face;
            counts[i as usize] += 1;
        }
    }

    sums.iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count == 0 { Vec3::ZERO } else { sum / count as f32 })
        .collect()
}
