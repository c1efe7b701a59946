//! Off-screen target layout and 8-bit encodings.
//!
//! Light-space and atlas targets are plain RGBA8 images. Depth is packed
//! into 24 bits across RGB so it can be sampled like any color texture;
//! lookups use nearest texels clamped to the edge.

mod atlas;
mod codec;
mod file;

pub use atlas::AtlasLayout;
pub use codec::*;
pub use file::save_image;

use image::{Rgba, RgbaImage};

use crate::util::Vec2;

/// Integer pixel rectangle inside a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// Texel of `uv` in [0, 1]² inside this rect, clamped to its edge.
    pub fn texel(&self, uv: Vec2) -> (u32, u32) {
        let tx = (uv.x * self.width as f32).floor().clamp(0.0, self.width.saturating_sub(1) as f32);
        let ty = (uv.y * self.height as f32).floor().clamp(0.0, self.height.saturating_sub(1) as f32);
        (self.x + tx as u32, self.y + ty as u32)
    }
}

/// Nearest texel of `uv` with clamp-to-edge addressing.
pub fn sample_nearest(image: &RgbaImage, uv: Vec2) -> Rgba<u8> {
    let (x, y) = PixelRect::full(image.width(), image.height()).texel(uv);
    *image.get_pixel(x, y)
}
