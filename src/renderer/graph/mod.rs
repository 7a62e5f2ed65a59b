//! Per-camera frame organisation
//!
//! - `resolution`: working size of the reflection map
//! - `frame_targets`: per-frame target allocation and release
//! - `commands`: the command stream recorded for the host
//! - `context`: the host-facing frame context trait
//! - `passes`: the SSR pass state machine and the compositor

pub mod commands;
pub mod context;
pub mod frame_targets;
pub mod passes;
pub mod resolution;

pub use commands::{CommandBuffer, KernelPass, MaterialId, RenderCommand, TextureId, TransientTextureId};
pub use context::{CameraTargetDescriptor, FrameContext, PassInputs, RenderPassEvent};
pub use frame_targets::{FilterMode, FrameResourceManager, FrameTargets, TargetDesc};
pub use passes::{Compositor, PassState, SsrPass};
pub use resolution::{Extent, plan_working_resolution, scene_copy_mip_count};
