//! Per-stage shading math: light-space encodings, ISM lookups and the
//! composite lighting model.

pub mod composite;
pub mod ism;
mod light;

pub use composite::{LightMaps, ShadingInputs};
pub use light::{DrawMode, LightSpace};
