//! Frame Resource Manager
//!
//! Allocates the two per-frame render targets of the SSR stage and guarantees
//! they are released again.
//!
//! ```text
//! configure()                                 release()
//!     │                                            │
//!     ├─► AllocateTarget  reflection map (≤ full)  ├─► ReleaseTarget scene copy
//!     ├─► AllocateTarget  scene copy (full, mips)  └─► ReleaseTarget reflection map
//!     └─► Blit            camera color → scene copy
//! ```
//!
//! [`FrameTargets`] is returned by value and consumed by
//! [`FrameResourceManager::release`], so a frame's targets cannot be released
//! twice. The manager keeps a running count of outstanding allocations that
//! must be zero between frames.

use crate::renderer::graph::commands::{CommandBuffer, RenderCommand, TextureId, TransientTextureId};
use crate::renderer::graph::context::CameraTargetDescriptor;
use crate::renderer::graph::resolution::{Extent, scene_copy_mip_count};

/// HDR color format of the reflection map.
pub const HDR_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Sampling mode a target is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel, no interpolation.
    Point,
    /// Linear within one mip.
    Bilinear,
    /// Linear within and across mips.
    Trilinear,
}

/// Descriptor for a transient render target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub filter: FilterMode,
    pub mip_level_count: u32,
    pub label: &'static str,
}

impl TargetDesc {
    #[inline]
    #[must_use]
    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

/// The two targets owned by one in-flight SSR pass.
#[derive(Debug)]
#[must_use = "frame targets must be released with FrameResourceManager::release"]
pub struct FrameTargets {
    reflection_map: TransientTextureId,
    scene_copy: TransientTextureId,
    reflection_desc: TargetDesc,
    scene_copy_desc: TargetDesc,
}

impl FrameTargets {
    #[inline]
    #[must_use]
    pub fn reflection_map(&self) -> TextureId {
        TextureId::Transient(self.reflection_map)
    }

    #[inline]
    #[must_use]
    pub fn scene_copy(&self) -> TextureId {
        TextureId::Transient(self.scene_copy)
    }

    #[must_use]
    pub fn reflection_desc(&self) -> &TargetDesc {
        &self.reflection_desc
    }

    #[must_use]
    pub fn scene_copy_desc(&self) -> &TargetDesc {
        &self.scene_copy_desc
    }
}

/// Issues transient target handles and tracks outstanding allocations.
#[derive(Debug, Default)]
pub struct FrameResourceManager {
    next_id: u32,
    outstanding: usize,
    frames_configured: u64,
}

impl FrameResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> TransientTextureId {
        let id = TransientTextureId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Records allocation of both targets and the initial scene-color snapshot.
    ///
    /// Returns `None` (recording nothing) when the camera target is degenerate.
    pub fn configure(
        &mut self,
        commands: &mut CommandBuffer,
        camera_color: TextureId,
        camera_desc: &CameraTargetDescriptor,
        working: Extent,
    ) -> Option<FrameTargets> {
        if camera_desc.is_degenerate() || working.is_empty() {
            log::trace!(
                "SSR: degenerate camera target {}x{}, skipping allocation",
                camera_desc.width,
                camera_desc.height
            );
            return None;
        }

        let reflection_desc = TargetDesc {
            width: working.width,
            height: working.height,
            format: HDR_TEXTURE_FORMAT,
            filter: FilterMode::Point,
            mip_level_count: 1,
            label: "_ReflectedColorMap",
        };

        let full = Extent::new(camera_desc.width, camera_desc.height);
        let scene_copy_desc = TargetDesc {
            width: full.width,
            height: full.height,
            format: camera_desc.format,
            filter: FilterMode::Trilinear,
            mip_level_count: scene_copy_mip_count(full),
            label: "_MainTex",
        };

        let reflection_map = self.next_id();
        let scene_copy = self.next_id();

        commands.push(RenderCommand::AllocateTarget {
            id: reflection_map,
            desc: reflection_desc.clone(),
        });
        commands.push(RenderCommand::AllocateTarget {
            id: scene_copy,
            desc: scene_copy_desc.clone(),
        });
        commands.blit(camera_color, TextureId::Transient(scene_copy));

        self.outstanding += 2;
        self.frames_configured += 1;

        Some(FrameTargets {
            reflection_map,
            scene_copy,
            reflection_desc,
            scene_copy_desc,
        })
    }

    /// Records release of both targets.
    pub fn release(&mut self, commands: &mut CommandBuffer, targets: FrameTargets) {
        commands.push(RenderCommand::ReleaseTarget {
            id: targets.scene_copy,
        });
        commands.push(RenderCommand::ReleaseTarget {
            id: targets.reflection_map,
        });
        self.outstanding -= 2;
    }

    /// Targets allocated and not yet released.
    #[inline]
    #[must_use]
    pub fn outstanding_allocations(&self) -> usize {
        self.outstanding
    }

    #[inline]
    #[must_use]
    pub fn frames_configured(&self) -> u64 {
        self.frames_configured
    }
}
