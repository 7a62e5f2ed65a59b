//! Recorded GPU Commands
//!
//! The SSR pass never owns GPU objects. It records [`RenderCommand`]s into the
//! host's [`CommandBuffer`], and the host submits the buffer to a backend
//! ([`SoftwareDevice`](crate::renderer::backends::software::SoftwareDevice) or
//! [`WgpuDevice`](crate::renderer::backends::wgpu_device::WgpuDevice)) whenever
//! it flushes the frame.
//!
//! # Resource handles
//!
//! | Kind      | Handle                               | Lifetime          |
//! |-----------|--------------------------------------|-------------------|
//! | Imported  | `TextureId::Imported(u32)`           | Owned by the host |
//! | Transient | `TextureId::Transient(TransientTextureId)` | One frame   |
//! | Material  | [`MaterialId`]                       | Feature lifetime  |

use smallvec::SmallVec;

use crate::renderer::graph::frame_targets::TargetDesc;
use crate::resources::ssr::SsrUniforms;

/// Handle to a per-frame render target allocated by the stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TransientTextureId(pub(crate) u32);

impl TransientTextureId {
    #[inline]
    #[must_use]
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Any texture a command can reference.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureId {
    /// Host-owned texture (camera color target, etc.).
    Imported(u32),
    /// Stage-owned per-frame target.
    Transient(TransientTextureId),
}

/// Handle to a compiled SSR program instance, issued by a
/// [`ShaderProvider`](crate::renderer::pipeline::shader_library::ShaderProvider).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MaterialId(pub(crate) u32);

impl MaterialId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// The two programs of the SSR material.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum KernelPass {
    /// Pass 0: raymarch scene color into the reflection map.
    Trace = 0,
    /// Pass 1: blend the reflection map over the scene copy.
    Compose = 1,
}

impl KernelPass {
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self as u32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderCommand {
    AllocateTarget {
        id: TransientTextureId,
        desc: TargetDesc,
    },
    ReleaseTarget {
        id: TransientTextureId,
    },
    /// Full-texture copy; regenerates the destination's mip chain.
    Blit {
        source: TextureId,
        destination: TextureId,
    },
    UploadUniforms {
        material: MaterialId,
        uniforms: SsrUniforms,
    },
    /// Fullscreen draw of one kernel pass. The current frame's depth, normal
    /// and motion buffers are bound implicitly.
    DrawPass {
        material: MaterialId,
        pass: KernelPass,
        source: TextureId,
        overlay: Option<TextureId>,
        destination: TextureId,
    },
}

/// Ordered list of commands for one frame, submitted by the host.
#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    label: &'static str,
    commands: SmallVec<[RenderCommand; 8]>,
}

impl CommandBuffer {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            commands: SmallVec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn blit(&mut self, source: TextureId, destination: TextureId) {
        self.push(RenderCommand::Blit {
            source,
            destination,
        });
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Removes and returns every recorded command, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<RenderCommand> {
        self.commands.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    fn count(&self, pred: impl Fn(&RenderCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCommand::DrawPass { .. }))
    }

    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCommand::AllocateTarget { .. }))
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCommand::ReleaseTarget { .. }))
    }

    #[must_use]
    pub fn blit_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCommand::Blit { .. }))
    }

    #[must_use]
    pub fn uniform_upload_count(&self) -> usize {
        self.count(|c| matches!(c, RenderCommand::UploadUniforms { .. }))
    }
}
