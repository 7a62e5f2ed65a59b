//! Frame Context
//!
//! The host renderer drives the SSR stage through the [`FrameContext`] trait
//! instead of a host-specific callback protocol. One context value describes
//! one camera in one frame.
//!
//! # Responsibilities
//!
//! | Host provides                 | Stage does                          |
//! |-------------------------------|-------------------------------------|
//! | camera data, color target     | derives frame state, plans targets  |
//! | frame buffer capabilities     | declares what it needs              |
//! | shader provider               | lazily builds its material          |
//! | command buffer                | records allocations / blits / draws |

use bitflags::bitflags;

use crate::renderer::graph::commands::{CommandBuffer, TextureId};
use crate::renderer::pipeline::shader_library::ShaderProvider;
use crate::scene::camera::CameraData;

bitflags! {
    /// Frame buffers a pass asks the host to make available.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PassInputs: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const NORMAL = 1 << 2;
        const MOTION = 1 << 3;
    }
}

/// Point in the host frame at which a stage is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPassEvent {
    BeforeRenderingOpaques,
    AfterRenderingOpaques,
    AfterRenderingSkybox,
    AfterRenderingTransparents,
    BeforeRenderingPostProcessing,
    AfterRenderingPostProcessing,
}

/// Size and format of the camera's color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraTargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl CameraTargetDescriptor {
    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-camera, per-frame interface to the host renderer.
pub trait FrameContext {
    /// Camera being rendered.
    fn camera(&self) -> &CameraData;

    /// Handle of the camera color target (read as trace source, written by compose).
    fn color_target(&self) -> TextureId;

    /// Descriptor of the camera color target.
    fn color_descriptor(&self) -> CameraTargetDescriptor;

    /// Declares which frame buffers the stage needs this frame.
    fn request_inputs(&mut self, inputs: PassInputs);

    /// Shader lookup / material factory.
    fn shaders(&mut self) -> &mut dyn ShaderProvider;

    /// Command buffer the host will submit for this camera.
    fn command_buffer(&mut self) -> &mut CommandBuffer;

    /// Host request to abandon the camera after configuration (e.g. the
    /// color target was lost). Checked once, before execution.
    fn is_aborted(&self) -> bool {
        false
    }
}
