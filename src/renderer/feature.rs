//! SSR Pipeline Feature
//!
//! [`SsrFeature`] is what a host renderer installs. It is invoked once per
//! camera per frame through [`SsrFeature::render_camera`], decides whether the
//! stage runs, and sequences the [`SsrPass`] lifecycle.
//!
//! # Outcomes
//!
//! | Condition                                   | Outcome                              |
//! |---------------------------------------------|--------------------------------------|
//! | camera post-processing off                  | `Skipped(PostProcessingDisabled)`    |
//! | [`SsrHandle::set_enabled`]`(false)`         | `Skipped(FeatureDisabled)`           |
//! | shader missing / material build failed      | `Skipped(ShaderUnavailable)` + one `error!` |
//! | zero-sized camera target                    | `Skipped(DegenerateTarget)`          |
//! | host abort or recording error after configure | `Aborted` (targets still released) |
//! | otherwise                                   | `Rendered`                           |
//!
//! No outcome aborts the host frame.

use std::sync::Arc;

use crate::errors::{Result, SsrError};
use crate::renderer::graph::commands::MaterialId;
use crate::renderer::graph::context::{FrameContext, RenderPassEvent};
use crate::renderer::graph::passes::ssr::SsrPass;
use crate::renderer::pipeline::shader_library::{SSR_SHADER_NAME, ShaderProvider};
use crate::resources::ssr::SsrSettings;
use crate::resources::ssr_handle::SsrHandle;
use crate::scene::camera::CameraFrameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PostProcessingDisabled,
    FeatureDisabled,
    ShaderUnavailable,
    DegenerateTarget,
}

/// Result of running the stage for one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraOutcome {
    /// Both kernel passes were recorded.
    Rendered,
    /// The stage did not run; nothing was allocated.
    Skipped(SkipReason),
    /// Targets were allocated but execution was abandoned; targets were released.
    Aborted,
}

impl CameraOutcome {
    #[inline]
    #[must_use]
    pub fn is_rendered(self) -> bool {
        self == Self::Rendered
    }
}

/// Host-facing SSR stage.
pub struct SsrFeature {
    handle: SsrHandle,
    shader_name: String,
    material: Option<MaterialId>,
    pass: SsrPass,
}

impl SsrFeature {
    /// Point in the frame at which the host should invoke the stage.
    pub const INJECTION_POINT: RenderPassEvent = RenderPassEvent::AfterRenderingTransparents;

    #[must_use]
    pub fn new(handle: SsrHandle) -> Self {
        Self {
            handle,
            shader_name: SSR_SHADER_NAME.to_owned(),
            material: None,
            pass: SsrPass::new(),
        }
    }

    /// Creates the feature and compiles its material eagerly.
    ///
    /// A failed warm-up is logged and retried lazily on the first camera.
    #[must_use]
    pub fn with_warm_up(handle: SsrHandle, shaders: &mut dyn ShaderProvider) -> Self {
        let mut feature = Self::new(handle);
        if let Err(err) = feature.warm_up(shaders) {
            log::warn!("SSR warm-up failed, will retry on first use: {err}");
        }
        feature
    }

    #[must_use]
    pub fn handle(&self) -> &SsrHandle {
        &self.handle
    }

    #[must_use]
    pub fn settings(&self) -> SsrSettings {
        self.handle.settings()
    }

    /// Replaces the settings; takes effect from the next camera.
    pub fn set_settings(&self, settings: SsrSettings) {
        self.handle.set_settings(settings);
    }

    #[must_use]
    pub fn shader_name(&self) -> &str {
        &self.shader_name
    }

    /// Cached material, if compiled.
    #[must_use]
    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    #[must_use]
    pub fn pass(&self) -> &SsrPass {
        &self.pass
    }

    pub fn pass_mut(&mut self) -> &mut SsrPass {
        &mut self.pass
    }

    /// Compiles the material now instead of on the first camera.
    pub fn warm_up(&mut self, shaders: &mut dyn ShaderProvider) -> Result<MaterialId> {
        self.ensure_material(shaders)
    }

    /// Returns the cached material, compiling it from the named shader on
    /// first use.
    pub fn ensure_material(&mut self, shaders: &mut dyn ShaderProvider) -> Result<MaterialId> {
        if let Some(material) = self.material {
            return Ok(material);
        }

        let shader = shaders
            .find_shader(&self.shader_name)
            .ok_or_else(|| SsrError::ShaderNotFound(self.shader_name.clone()))?;
        let material = shaders.create_material(&shader)?;

        log::debug!("SSR material {material:?} compiled from `{}`", self.shader_name);
        self.material = Some(material);
        Ok(material)
    }

    /// Drops the cached material; the next camera recompiles it.
    pub fn reload_material(&mut self, shaders: &mut dyn ShaderProvider) {
        if let Some(material) = self.material.take() {
            shaders.destroy_material(material);
        }
    }

    /// Switches to another named shader and drops the cached material.
    pub fn set_shader_name(&mut self, shaders: &mut dyn ShaderProvider, name: impl Into<String>) {
        self.shader_name = name.into();
        self.reload_material(shaders);
    }

    /// Releases the cached material.
    pub fn dispose(&mut self, shaders: &mut dyn ShaderProvider) {
        self.reload_material(shaders);
    }

    /// Runs the stage for one camera.
    pub fn render_camera(&mut self, ctx: &mut dyn FrameContext) -> CameraOutcome {
        let settings: Arc<SsrSettings> = self.handle.snapshot();

        if !ctx.camera().post_processing {
            return CameraOutcome::Skipped(SkipReason::PostProcessingDisabled);
        }
        if !self.handle.is_enabled() {
            return CameraOutcome::Skipped(SkipReason::FeatureDisabled);
        }

        let material = match self.ensure_material(ctx.shaders()) {
            Ok(material) => material,
            Err(err) => {
                log::error!("SSR skipped for this camera: {err}");
                return CameraOutcome::Skipped(SkipReason::ShaderUnavailable);
            }
        };

        let frame = CameraFrameState::from_camera(ctx.camera());

        match self.pass.configure(ctx, material, &frame, &settings) {
            Ok(true) => {}
            Ok(false) => return CameraOutcome::Skipped(SkipReason::DegenerateTarget),
            Err(err) => {
                log::error!("SSR configure failed: {err}");
                self.pass.cleanup(ctx);
                return CameraOutcome::Aborted;
            }
        }

        let outcome = if ctx.is_aborted() {
            log::warn!("SSR aborted by host after configure");
            CameraOutcome::Aborted
        } else {
            match self.pass.execute(ctx) {
                Ok(()) => CameraOutcome::Rendered,
                Err(err) => {
                    log::error!("SSR execute failed: {err}");
                    CameraOutcome::Aborted
                }
            }
        };

        self.pass.cleanup(ctx);
        outcome
    }
}
