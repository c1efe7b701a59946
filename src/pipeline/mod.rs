//! Shadow pipeline: configuration, caching, the backend seam and the
//! orchestrator that sequences stages per frame.

mod backend;
mod cache;
mod config;
mod dump;
mod mode;
mod orchestrator;
pub mod software;

pub use backend::{AccumulateRow, CompositeJob, RenderBackend};
pub use cache::{IrradianceEntry, ShadowPipelineCache};
pub use config::{RenderConfig, VplSource};
pub use dump::{Dumper, ATLAS_STEM, IRRADIANCE_FILE};
pub use mode::ShadowMode;
pub use orchestrator::ShadowPipeline;
pub use software::SoftwareBackend;
