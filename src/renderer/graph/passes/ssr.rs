//! Screen Space Reflections (SSR) Render Pass
//!
//! Drives one camera through the stage's lifecycle and records every GPU
//! operation into the host's command buffer.
//!
//! # Lifecycle
//!
//! ```text
//!            configure() ok            execute()             cleanup()
//!   Idle ───────────────────► Configured ─────────► Executed ─────────► CleanedUp
//!    │                             │                                       ▲
//!    │ configure() degenerate      └───────────── cleanup() ───────────────┘
//!    ▼                                    (abort: execute skipped)
//!  Skipped
//! ```
//!
//! `Skipped` and `CleanedUp` are terminal for the camera; the next camera
//! starts again with [`SsrPass::configure`].
//!
//! # Recorded Commands
//!
//! | Step      | Commands                                                     |
//! |-----------|--------------------------------------------------------------|
//! | configure | allocate reflection map, allocate scene copy, blit color → copy, upload uniforms |
//! | execute   | trace draw, (re-blit color → copy), compose draw              |
//! | cleanup   | release scene copy, release reflection map                   |

use crate::errors::{Result, SsrError};
use crate::renderer::graph::commands::{KernelPass, MaterialId, RenderCommand, TextureId};
use crate::renderer::graph::context::{FrameContext, PassInputs};
use crate::renderer::graph::frame_targets::{FrameResourceManager, FrameTargets};
use crate::renderer::graph::passes::compose::Compositor;
use crate::renderer::graph::resolution::plan_working_resolution;
use crate::resources::ssr::{SsrSettings, SsrUniforms};
use crate::scene::camera::CameraFrameState;

/// Frame buffers the stage reads.
pub const SSR_PASS_INPUTS: PassInputs = PassInputs::COLOR
    .union(PassInputs::DEPTH)
    .union(PassInputs::NORMAL)
    .union(PassInputs::MOTION);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Skipped,
    Configured,
    Executed,
    CleanedUp,
}

impl PassState {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Skipped => "Skipped",
            Self::Configured => "Configured",
            Self::Executed => "Executed",
            Self::CleanedUp => "CleanedUp",
        }
    }

    /// Whether a new camera may be configured from this state.
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Idle | Self::Skipped | Self::CleanedUp)
    }
}

/// Configured pass data for the in-flight camera.
#[derive(Debug)]
struct InFlight {
    material: MaterialId,
    camera_color: TextureId,
    targets: FrameTargets,
}

/// SSR render pass.
///
/// Owns the frame resource manager and the compositor. Holds the frame
/// targets of at most one camera at a time.
#[derive(Debug)]
pub struct SsrPass {
    state: PassState,
    resources: FrameResourceManager,
    compositor: Compositor,
    in_flight: Option<InFlight>,
}

impl Default for SsrPass {
    fn default() -> Self {
        Self::new()
    }
}

impl SsrPass {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PassState::Idle,
            resources: FrameResourceManager::new(),
            compositor: Compositor::new(),
            in_flight: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> PassState {
        self.state
    }

    #[must_use]
    pub fn resources(&self) -> &FrameResourceManager {
        &self.resources
    }

    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Targets of the configured camera, if any.
    #[must_use]
    pub fn targets(&self) -> Option<&FrameTargets> {
        self.in_flight.as_ref().map(|f| &f.targets)
    }

    /// Whether the scene copy is refreshed again right before compose.
    ///
    /// Default: `true`
    pub fn set_resnapshot_before_compose(&mut self, enabled: bool) {
        self.compositor.set_resnapshot_before_compose(enabled);
    }

    fn expect_state(&self, ok: bool, expected: &'static str) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(SsrError::InvalidPassState {
                expected,
                found: self.state.name(),
            })
        }
    }

    /// Requests frame inputs, allocates the frame targets, snapshots scene
    /// color and uploads uniforms.
    ///
    /// Returns `Ok(false)` when the camera target is degenerate; the pass is
    /// then `Skipped` and nothing was allocated.
    pub fn configure(
        &mut self,
        ctx: &mut dyn FrameContext,
        material: MaterialId,
        frame: &CameraFrameState,
        settings: &SsrSettings,
    ) -> Result<bool> {
        self.expect_state(self.state.is_ready(), "Idle, Skipped or CleanedUp")?;

        ctx.request_inputs(SSR_PASS_INPUTS);

        let camera_desc = ctx.color_descriptor();
        let camera_color = ctx.color_target();

        let Some(working) = plan_working_resolution(frame.screen_width, frame.screen_height, settings.downsample)
        else {
            log::trace!(
                "SSR: degenerate screen {}x{}, skipping",
                frame.screen_width,
                frame.screen_height
            );
            self.state = PassState::Skipped;
            return Ok(false);
        };

        let commands = ctx.command_buffer();
        let Some(targets) = self
            .resources
            .configure(commands, camera_color, &camera_desc, working)
        else {
            self.state = PassState::Skipped;
            return Ok(false);
        };

        commands.push(RenderCommand::UploadUniforms {
            material,
            uniforms: SsrUniforms::new(frame, settings, working.as_vec2()),
        });

        self.in_flight = Some(InFlight {
            material,
            camera_color,
            targets,
        });
        self.state = PassState::Configured;
        Ok(true)
    }

    /// Records the trace and compose passes.
    pub fn execute(&mut self, ctx: &mut dyn FrameContext) -> Result<()> {
        self.expect_state(self.state == PassState::Configured, "Configured")?;
        let Some(in_flight) = self.in_flight.as_ref() else {
            return Err(SsrError::InvalidPassState {
                expected: "Configured",
                found: "Configured without targets",
            });
        };

        let commands = ctx.command_buffer();
        let reflection_map = in_flight.targets.reflection_map();
        let scene_copy = in_flight.targets.scene_copy();

        commands.push(RenderCommand::DrawPass {
            material: in_flight.material,
            pass: KernelPass::Trace,
            source: in_flight.camera_color,
            overlay: None,
            destination: reflection_map,
        });

        self.compositor.record(
            commands,
            in_flight.material,
            in_flight.camera_color,
            scene_copy,
            reflection_map,
        );

        self.state = PassState::Executed;
        Ok(())
    }

    /// Releases the frame targets. Valid from any state; a no-op when
    /// nothing is allocated.
    pub fn cleanup(&mut self, ctx: &mut dyn FrameContext) {
        if let Some(in_flight) = self.in_flight.take() {
            self.resources.release(ctx.command_buffer(), in_flight.targets);
            self.state = PassState::CleanedUp;
        }
    }
}
