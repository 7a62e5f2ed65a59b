#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! # Myth SSR
//!
//! Screen-space reflections as a post-processing stage for a host renderer.
//!
//! The stage traces reflections through the already rendered depth and
//! normal buffers into a reduced-resolution reflection map, then blends that
//! map back over a copy of the scene color.
//!
//! ```rust,ignore
//! use myth_ssr::{SsrFeature, SsrHandle, SoftwareDevice};
//!
//! let handle = SsrHandle::default();
//! let mut feature = SsrFeature::new(handle.clone());
//!
//! let mut frame = device.begin_frame(camera, color);
//! let outcome = feature.render_camera(&mut frame);
//! frame.finish()?;
//! ```

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use errors::{Result, SsrError};
pub use renderer::backends::software::{GBuffer, SoftwareDevice, SoftwareFrame, SoftwareTexture};
pub use renderer::backends::wgpu_device::{FrameInputViews, WgpuDevice};
pub use renderer::feature::{CameraOutcome, SkipReason, SsrFeature};
pub use renderer::graph::commands::{CommandBuffer, RenderCommand, TextureId};
pub use renderer::graph::context::{FrameContext, PassInputs, RenderPassEvent};
pub use resources::ssr::{SsrSettings, SsrUniforms};
pub use resources::ssr_handle::SsrHandle;
pub use scene::camera::{CameraData, CameraFrameState, CameraKind};
