//! Software triangle rasterizer used by the CPU render backend.
//!
//! Triangles are clipped against the near plane (clip z >= 0 under wgpu
//! conventions), fanned back into triangles, and scan-converted over their
//! screen bounding box with edge functions. Attributes are interpolated
//! perspective-correctly through 1/w; depth is interpolated linearly in
//! screen space and tested with `Less`.

use smallvec::SmallVec;

use crate::geom::GeometryBuffer;
use crate::target::PixelRect;
use crate::util::{Mat4, Vec2, Vec3, Vec4};

const NEAR_EPSILON: f32 = 1e-6;

type Polygon = SmallVec<[RasterVertex; 5]>;

/// Vertex after the vertex stage.
#[derive(Debug, Clone, Copy)]
pub struct RasterVertex {
    pub clip: Vec4,
    pub world: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl RasterVertex {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
            color: self.color.lerp(other.color, t),
        }
    }
}

/// A covered pixel that passed the depth test.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    pub depth: f32,
    pub world: Vec3,
    /// Interpolated, not renormalized.
    pub normal: Vec3,
    pub color: Vec3,
}

/// Depth values for one rectangle of a target, cleared to 1.0.
pub struct DepthBuffer {
    rect: PixelRect,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(rect: PixelRect) -> Self {
        Self {
            rect,
            data: vec![1.0; (rect.width * rect.height) as usize],
        }
    }

    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[self.index(x, y)]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y - self.rect.y) * self.rect.width + (x - self.rect.x)) as usize
    }

    fn test_and_set(&mut self, x: u32, y: u32, depth: f32) -> bool {
        let i = self.index(x, y);
        if depth < self.data[i] {
            self.data[i] = depth;
            true
        } else {
            false
        }
    }
}

/// Draws into the rectangle owned by its depth buffer.
pub struct Rasterizer<'a> {
    depth: &'a mut DepthBuffer,
}

impl<'a> Rasterizer<'a> {
    pub fn new(depth: &'a mut DepthBuffer) -> Self {
        Self { depth }
    }

    /// Transform every triangle of `geometry` by `view_projection` and
    /// call `shade` for each visible fragment.
    pub fn draw_geometry(
        &mut self,
        geometry: &GeometryBuffer,
        view_projection: Mat4,
        mut shade: impl FnMut(&Fragment),
    ) {
        let positions = geometry.positions();
        let normals = geometry.normals();
        let colors = geometry.colors();

        let vertex = |i: u32| {
            let i = i as usize;
            RasterVertex {
                clip: view_projection * positions[i].extend(1.0),
                world: positions[i],
                normal: normals[i],
                color: colors[i],
            }
        };

        for tri in geometry.triangles() {
            self.draw_triangle((*tri).map(vertex), &mut shade);
        }
    }

    pub fn draw_triangle(&mut self, verts: [RasterVertex; 3], shade: &mut impl FnMut(&Fragment)) {
        let polygon = clip_near(&verts);
        if polygon.len() < 3 {
            return;
        }
        for i in 1..polygon.len() - 1 {
            self.scan_triangle([polygon[0], polygon[i], polygon[i + 1]], shade);
        }
    }

    fn scan_triangle(&mut self, verts: [RasterVertex; 3], shade: &mut impl FnMut(&Fragment)) {
        let rect = self.depth.rect();
        let inv_w = verts.map(|v| 1.0 / v.clip.w);
        let screen: [Vec3; 3] = std::array::from_fn(|i| {
            let ndc = verts[i].clip.truncate() * inv_w[i];
            Vec3::new(
                rect.x as f32 + (ndc.x * 0.5 + 0.5) * rect.width as f32,
                rect.y as f32 + (0.5 - ndc.y * 0.5) * rect.height as f32,
                ndc.z,
            )
        });

        let area = edge(screen[0].truncate(), screen[1].truncate(), screen[2].truncate());
        if area.abs() < f32::EPSILON {
            return;
        }

        let min = screen[0].min(screen[1]).min(screen[2]);
        let max = screen[0].max(screen[1]).max(screen[2]);
        let x0 = min.x.floor().max(rect.x as f32) as u32;
        let y0 = min.y.floor().max(rect.y as f32) as u32;
        let x1 = (max.x.ceil() as i64).min((rect.x + rect.width) as i64);
        let y1 = (max.y.ceil() as i64).min((rect.y + rect.height) as i64);
        if x1 <= x0 as i64 || y1 <= y0 as i64 {
            return;
        }

        for py in y0..y1 as u32 {
            for px in x0..x1 as u32 {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let b0 = edge(screen[1].truncate(), screen[2].truncate(), p) / area;
                let b1 = edge(screen[2].truncate(), screen[0].truncate(), p) / area;
                let b2 = edge(screen[0].truncate(), screen[1].truncate(), p) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let depth = b0 * screen[0].z + b1 * screen[1].z + b2 * screen[2].z;
                if !(0.0..=1.0).contains(&depth) || !self.depth.test_and_set(px, py, depth) {
                    continue;
                }

                // Perspective-correct weights
                let (w0, w1, w2) = (b0 * inv_w[0], b1 * inv_w[1], b2 * inv_w[2]);
                let norm = 1.0 / (w0 + w1 + w2);
                let mix = |a: Vec3, b: Vec3, c: Vec3| (a * w0 + b * w1 + c * w2) * norm;

                shade(&Fragment {
                    x: px,
                    y: py,
                    depth,
                    world: mix(verts[0].world, verts[1].world, verts[2].world),
                    normal: mix(verts[0].normal, verts[1].normal, verts[2].normal),
                    color: mix(verts[0].color, verts[1].color, verts[2].color),
                });
            }
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Clip to `w >= NEAR_EPSILON`, then to `z >= 0`.
fn clip_near(verts: &[RasterVertex; 3]) -> Polygon {
    let polygon = clip_against(verts, |v| v.clip.w - NEAR_EPSILON);
    clip_against(&polygon, |v| v.clip.z)
}

/// One Sutherland-Hodgman pass keeping the side where `dist >= 0`.
fn clip_against(polygon: &[RasterVertex], dist: impl Fn(&RasterVertex) -> f32) -> Polygon {
    let mut out = Polygon::new();
    for (i, a) in polygon.iter().enumerate() {
        let b = &polygon[(i + 1) % polygon.len()];
        let (da, db) = (dist(a), dist(b));

        if da >= 0.0 {
            out.push(*a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            out.push(a.lerp(b, da / (da - db)));
        }
    }
    out
}
