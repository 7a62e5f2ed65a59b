//! Render pass implementations of the SSR stage.

pub mod compose;
pub mod ssr;

pub use compose::Compositor;
pub use ssr::{PassState, SSR_PASS_INPUTS, SsrPass};
