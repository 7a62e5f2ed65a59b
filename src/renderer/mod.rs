//! SSR stage: frame graph pieces, shader lookup, backends and the pipeline
//! feature hosts install.

pub mod backends;
pub mod feature;
pub mod graph;
pub mod pipeline;

pub use feature::{CameraOutcome, SkipReason, SsrFeature};
