//! # Shadowmaps
//!
//! Shadow mapping (SM), reflective shadow maps (RSM) and imperfect shadow
//! maps (ISM) over a small static scene, with an arcball-driven camera.
//!
//! The light-dependent stages run once and are cached; every frame only
//! re-runs the camera-dependent work: the ISM irradiance accumulation and
//! the final composite.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math helpers
//! - [`geom`] - Triangle meshes: surface file loading and procedural shapes
//! - [`camera`] - Cameras, projections and the arcball controller
//! - [`sampling`] - Disc kernel and VPL placement
//! - [`target`] - Render target encodings and the ISM atlas layout
//! - [`raster`] - Software triangle rasterizer
//! - [`stage`] - Light-space, ISM and composite shading math
//! - [`pipeline`] - Stage orchestration, caching and render backends
//!
//! ## Example
//!
//! ```ignore
//! use shadowmaps::prelude::*;
//!
//! let scene = Scene::load(None, ReceiverKind::ColorBox)?;
//! let config = RenderConfig { seed: Seed::Fixed(1), ..Default::default() };
//! let mut pipeline = ShadowPipeline::new(SoftwareBackend::new(), config.clone())?;
//! let size = ViewportSize::new(640, 480);
//! let camera = ArcballController::new(config.camera, size);
//! let frame = pipeline.render_frame(&scene, &camera.transforms(), size)?;
//! frame.save("frame.png")?;
//! ```

pub mod util;
pub mod geom;
pub mod camera;
pub mod sampling;
pub mod target;
pub mod raster;
pub mod stage;
pub mod pipeline;

// Interactive viewer (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::camera::{ArcballController, Camera, PointerButton, Projection, ViewTransforms, ViewportSize};
    pub use crate::geom::{GeometryBuffer, ReceiverKind, Scene};
    pub use crate::pipeline::{
        RenderBackend, RenderConfig, ShadowMode, ShadowPipeline, SoftwareBackend, VplSource,
    };
    pub use crate::sampling::{Seed, Vpl};
    pub use crate::util::{Error, Result};
}
