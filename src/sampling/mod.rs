//! Random sampling: disc kernel and virtual point light placement.
//!
//! Every sampler takes the random source as a parameter. [`Seed`] decides
//! whether a run is reproducible (`Fixed`) or re-randomized (`Entropy`).

mod area;
mod kernel;
mod rejection;
mod vpl;

pub use area::{fold_barycentric, sample_surface, surface_sample_count};
pub use kernel::{DiscKernel, KERNEL_SIZE};
pub use rejection::{sample_rejection, LightSpaceImages, RejectionOutcome};
pub use vpl::{Vpl, VPL_NORMAL_OFFSET};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Source of randomness for kernel generation and VPL placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Seed {
    /// Same samples on every run.
    Fixed(u64),
    /// Seeded from the OS once per process.
    #[default]
    Entropy,
}

impl Seed {
    pub fn rng(&self) -> StdRng {
        match *self {
            Seed::Fixed(seed) => StdRng::seed_from_u64(seed),
            Seed::Entropy => StdRng::from_entropy(),
        }
    }
}
