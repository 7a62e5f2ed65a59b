//! SSR (Screen-Space Reflections) Configuration
//!
//! This module defines SSR settings as pure data structures, following the same
//! pattern as the other post-processing settings of the engine: a plain `Copy`
//! settings struct that users read and replace, and a `#[repr(C)]` GPU uniform
//! struct that the pass uploads once per camera per frame.
//!
//! # Clamping
//!
//! Settings are never trusted as written. [`SsrSettings::clamped`] enforces:
//!
//! | Field            | Range                     |
//! |------------------|---------------------------|
//! | `step_stride`    | `[0.001, f32::MAX]`       |
//! | `max_steps`      | `[0, f32::MAX]`          |
//! | `downsample`     | `[0, 2]`                  |
//! | `min_smoothness` | `[0, 1]`                  |
//!
//! Every write path ([`SsrHandle::set_settings`](super::ssr_handle::SsrHandle::set_settings),
//! [`SsrSettings::from_json`]) goes through it.

use glam::{Mat4, Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::scene::camera::CameraFrameState;

/// Smallest accepted raymarch stride.
pub const MIN_STEP_STRIDE: f32 = 0.001;

/// Largest accepted downsample factor (resolution divisor = 3).
pub const MAX_DOWNSAMPLE: u32 = 2;

// ============================================================================
// SsrSettings
// ============================================================================

/// User-facing SSR tuning parameters.
///
/// This is both the long-lived configuration owned by the feature and the
/// snapshot handed out by the settings accessor. It is `Copy`, so readers never
/// observe a partially replaced value.
///
/// # Example
///
/// ```rust,ignore
/// let settings = SsrSettings {
///     step_stride: 0.05,
///     downsample: 1,
///     ..Default::default()
/// };
/// handle.set_settings(settings);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrSettings {
    /// Raymarch step length in view-space units.
    ///
    /// Smaller values give higher quality but need more steps to cover the
    /// same distance. Default: `0.03`
    pub step_stride: f32,

    /// Upper bound on raymarch iterations (trades performance for trace distance).
    ///
    /// Default: `128`
    pub max_steps: f32,

    /// Resolution divisor minus one: `0` = full, `1` = half, `2` = third.
    ///
    /// Default: `0`
    pub downsample: u32,

    /// Surfaces with smoothness below this value skip the reflection lookup.
    ///
    /// Default: `0.5`
    pub min_smoothness: f32,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            step_stride: 0.03,
            max_steps: 128.0,
            downsample: 0,
            min_smoothness: 0.5,
        }
    }
}

impl SsrSettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with every field forced into its valid range.
    ///
    /// `f32::max` / `f32::min` discard NaN operands, so NaN inputs collapse to
    /// the lower bound of each range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            step_stride: self.step_stride.max(MIN_STEP_STRIDE).min(f32::MAX),
            max_steps: self.max_steps.max(0.0).min(f32::MAX),
            downsample: self.downsample.min(MAX_DOWNSAMPLE),
            min_smoothness: self.min_smoothness.max(0.0).min(1.0),
        }
    }

    /// Resolution divisor applied to the reflection buffer (`downsample + 1`).
    #[inline]
    #[must_use]
    pub fn scale(&self) -> u32 {
        self.downsample.min(MAX_DOWNSAMPLE) + 1
    }

    /// Parses settings from JSON. Missing fields take their defaults and the
    /// result is clamped.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.clamped())
    }

    /// Serializes the settings to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// GPU Uniform Struct
// ============================================================================

/// Per-frame uniform block consumed by both kernel passes.
///
/// Layout matches `SsrUniforms` in `ssr.wgsl` (all members are 16-byte
/// aligned, 304 bytes total).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SsrUniforms {
    pub view_matrix: Mat4,
    pub inverse_view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub inverse_projection_matrix: Mat4,
    /// World-space camera forward (`w` unused).
    pub view_direction: Vec4,
    pub render_scale: f32,
    pub stride: f32,
    pub num_steps: f32,
    pub min_smoothness: f32,
    /// Screen size after render scale.
    pub screen_size: Vec2,
    /// Reflection buffer size.
    pub working_size: Vec2,
}

impl Default for SsrUniforms {
    fn default() -> Self {
        let settings = SsrSettings::default();
        Self {
            view_matrix: Mat4::IDENTITY,
            inverse_view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            inverse_projection_matrix: Mat4::IDENTITY,
            view_direction: Vec4::new(0.0, 0.0, -1.0, 0.0),
            render_scale: 1.0,
            stride: settings.step_stride,
            num_steps: settings.max_steps,
            min_smoothness: settings.min_smoothness,
            screen_size: Vec2::ONE,
            working_size: Vec2::ONE,
        }
    }
}

impl SsrUniforms {
    /// Packs the camera state and a settings snapshot into the GPU layout.
    #[must_use]
    pub fn new(frame: &CameraFrameState, settings: &SsrSettings, working_size: Vec2) -> Self {
        Self {
            view_matrix: frame.view_matrix,
            inverse_view_matrix: frame.inverse_view_matrix,
            projection_matrix: frame.projection_matrix,
            inverse_projection_matrix: frame.inverse_projection_matrix,
            view_direction: frame.view_direction.extend(0.0),
            render_scale: frame.render_scale,
            stride: settings.step_stride,
            num_steps: settings.max_steps,
            min_smoothness: settings.min_smoothness,
            screen_size: Vec2::new(frame.screen_width, frame.screen_height),
            working_size,
        }
    }

    /// Byte view for buffer uploads.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
