//! Disc sampling kernel shared by soft shadows and RSM gathering.

use rand::Rng;
use std::f32::consts::TAU;

use crate::util::Vec2;

/// Default number of kernel points.
pub const KERNEL_SIZE: usize = 256;

/// Fixed set of points `(r cos θ, r sin θ)` with `r` and `θ` uniform.
///
/// Generated once and reused for every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscKernel {
    samples: Vec<Vec2>,
}

impl DiscKernel {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Self {
        let samples = (0..count)
            .map(|_| {
                let r: f32 = rng.gen();
                let theta = TAU * rng.gen::<f32>();
                Vec2::new(r * theta.cos(), r * theta.sin())
            })
            .collect();
        Self { samples }
    }

    pub fn samples(&self) -> &[Vec2] {
        &self.samples
    }

    /// The first `n` points, or all of them when fewer exist.
    pub fn first(&self, n: usize) -> &[Vec2] {
        &self.samples[..n.min(self.samples.len())]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
