//! Procedural geometry: checker floor, color box, cube.

use super::GeometryBuffer;
use crate::util::Vec3;

/// Light checker cell color.
pub const CHECKER_COLOR_A: Vec3 = Vec3::new(0.8, 0.8, 0.8);
/// Dark checker cell color.
pub const CHECKER_COLOR_B: Vec3 = Vec3::new(0.5, 0.5, 0.5);

const BOX_WHITE: Vec3 = Vec3::new(0.8, 0.8, 0.8);
const BOX_RED: Vec3 = Vec3::new(0.75, 0.15, 0.15);
const BOX_GREEN: Vec3 = Vec3::new(0.15, 0.75, 0.15);

/// Collects unshared quads; every quad owns its four vertices.
#[derive(Default)]
struct QuadSoup {
    positions: Vec<Vec3>,
    colors: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl QuadSoup {
    /// Quad centered at `center` spanning `±u` and `±v`. Faces `u × v`.
    fn centered(&mut self, center: Vec3, u: Vec3, v: Vec3, color: Vec3) {
        let k = self.positions.len() as u32;
        self.positions.extend([center - u - v, center + u - v, center + u + v, center - u + v]);
        self.colors.extend([color; 4]);
        self.triangles.push([k, k + 1, k + 2]);
        self.triangles.push([k, k + 2, k + 3]);
    }

    fn finish(self) -> GeometryBuffer {
        GeometryBuffer::from_parts(self.positions, self.colors, self.triangles)
    }
}

impl GeometryBuffer {
    /// Grid of `rows × cols` square cells on the plane through
    /// `-distance * normal`, alternating `color_a`/`color_b` by
    /// `(row + col) % 2`.
    ///
    /// Each cell contributes 4 vertices and 2 triangles; no vertex is
    /// shared between cells.
    pub fn checker_floor(
        normal: Vec3,
        distance: f32,
        cell_size: f32,
        rows: u32,
        cols: u32,
        color_a: Vec3,
        color_b: Vec3,
    ) -> Self {
        let w = normal.normalize_or_zero();
        let v = if w.x > 1e-6 { Vec3::Y.cross(w) } else { Vec3::X.cross(w) }.normalize_or_zero();
        let u = w.cross(v).normalize_or_zero();
        let origin = -distance * w;

        let cells = (rows * cols) as usize;
        let mut positions = Vec::with_capacity(cells * 4);
        let mut colors = Vec::with_capacity(cells * 4);
        let mut triangles = Vec::with_capacity(cells * 2);

        let half_rows = (rows / 2) as f32;
        let half_cols = (cols / 2) as f32;
        for i in 0..rows {
            for j in 0..cols {
                let v0 = origin
                    - (i as f32 - half_rows) * v * cell_size
                    - (j as f32 - half_cols) * u * cell_size;
                let color = if (i + j) % 2 == 0 { color_a } else { color_b };

                let k = positions.len() as u32;
                positions.extend([
                    v0,
                    v0 + u * cell_size,
                    v0 + v * cell_size,
                    v0 + (u + v) * cell_size,
                ]);
                colors.extend([color; 4]);
                triangles.push([k, k + 3, k + 1]);
                triangles.push([k, k + 2, k + 3]);
            }
        }

        Self::from_parts(positions, colors, triangles)
    }

    /// Open box with inward-facing walls: white floor and back wall, red
    /// left wall, green right wall. Top and front are open.
    ///
    /// Spans `[-half_size, half_size]` in x and z and rises `2 * half_size`
    /// from `floor_y`.
    pub fn color_box(half_size: f32, floor_y: f32) -> Self {
        let h = half_size;
        let mid_y = floor_y + h;
        let mut soup = QuadSoup::default();

        soup.centered(Vec3::new(0.0, floor_y, 0.0), Vec3::Z * h, Vec3::X * h, BOX_WHITE);
        soup.centered(Vec3::new(0.0, mid_y, -h), Vec3::X * h, Vec3::Y * h, BOX_WHITE);
        soup.centered(Vec3::new(-h, mid_y, 0.0), Vec3::Y * h, Vec3::Z * h, BOX_RED);
        soup.centered(Vec3::new(h, mid_y, 0.0), Vec3::Z * h, Vec3::Y * h, BOX_GREEN);

        soup.finish()
    }

    /// Axis-aligned cube with outward faces.
    pub fn cube(center: Vec3, half_size: f32, color: Vec3) -> Self {
        let h = half_size;
        let (x, y, z) = (Vec3::X * h, Vec3::Y * h, Vec3::Z * h);
        let mut soup = QuadSoup::default();

        soup.centered(center + x, y, z, color);
        soup.centered(center - x, z, y, color);
        soup.centered(center + y, z, x, color);
        soup.centered(center - y, x, z, color);
        soup.centered(center + z, x, y, color);
        soup.centered(center - z, y, x, color);

        soup.finish()
    }
}
