//! Reflection Compositor
//!
//! Records kernel pass 1, which blends the traced reflection map over the
//! scene copy and writes the result into the camera color target.
//!
//! ```text
//!   camera color ──(re-blit)──► scene copy ──┐
//!                                            ├──► fs_compose ──► camera color
//!   reflection map ──────────────────────────┘
//! ```
//!
//! The re-blit refreshes the scene copy from camera color right before the
//! blend. It is on by default; hosts that can prove the trace pass never
//! aliases the camera color target may turn it off.

use crate::renderer::graph::commands::{CommandBuffer, KernelPass, MaterialId, RenderCommand, TextureId};

/// Records the compose half of the SSR stage.
#[derive(Debug, Clone)]
pub struct Compositor {
    resnapshot_before_compose: bool,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            resnapshot_before_compose: true,
        }
    }
}

impl Compositor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn resnapshot_before_compose(&self) -> bool {
        self.resnapshot_before_compose
    }

    pub fn set_resnapshot_before_compose(&mut self, enabled: bool) {
        self.resnapshot_before_compose = enabled;
    }

    /// Records the optional scene re-snapshot followed by the compose draw.
    pub fn record(
        &self,
        commands: &mut CommandBuffer,
        material: MaterialId,
        camera_color: TextureId,
        scene_copy: TextureId,
        reflection_map: TextureId,
    ) {
        if self.resnapshot_before_compose {
            commands.blit(camera_color, scene_copy);
        }

        commands.push(RenderCommand::DrawPass {
            material,
            pass: KernelPass::Compose,
            source: scene_copy,
            overlay: Some(reflection_map),
            destination: camera_color,
        });
    }
}
