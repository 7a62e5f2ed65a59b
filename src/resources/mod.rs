//! SSR configuration resources.

pub mod ssr;
pub mod ssr_handle;

pub use ssr::{SsrSettings, SsrUniforms};
pub use ssr_handle::SsrHandle;
