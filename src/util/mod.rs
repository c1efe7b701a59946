//! Utility types shared by every stage.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math re-exports from glam plus shadow-space helpers
//! - [`init_tracing`] - Chrome trace capture

mod error;
mod math;
mod trace;

pub use error::*;
pub use math::*;
pub use trace::{init_tracing, TRACE_ENV};
