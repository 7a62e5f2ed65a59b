//! Camera data as seen by the SSR stage.
//!
//! The host renderer owns its cameras. Per frame it hands the stage a
//! [`CameraData`] describing one camera, and the stage derives a
//! [`CameraFrameState`] from it exactly once.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraKind {
    /// Regular in-game camera; honours the pipeline render scale.
    #[default]
    Game,
    /// Editor scene-view camera; always rendered at scale 1.
    SceneView,
}

/// Host-supplied camera description for one frame.
#[derive(Debug, Clone)]
pub struct CameraData {
    pub kind: CameraKind,
    /// Camera viewport size in pixels, before render scale.
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Pipeline render scale (ignored for scene-view cameras).
    pub render_scale: f32,
    /// Whether post-processing is enabled for this camera.
    pub post_processing: bool,
    /// World → view.
    pub view_matrix: Mat4,
    /// View → clip, already adjusted for the GPU's clip-space conventions.
    pub projection_matrix: Mat4,
    /// World-space forward direction of the camera.
    pub forward: Vec3,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            kind: CameraKind::Game,
            pixel_width: 1,
            pixel_height: 1,
            render_scale: 1.0,
            post_processing: true,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            forward: Vec3::NEG_Z,
        }
    }
}

impl CameraData {
    /// Builds camera data from a world transform's view matrix and a projection.
    ///
    /// The forward vector is taken from the inverse view matrix (the camera
    /// looks down its local `-Z`).
    #[must_use]
    pub fn new(pixel_width: u32, pixel_height: u32, view_matrix: Mat4, projection_matrix: Mat4) -> Self {
        let forward = view_matrix
            .inverse()
            .transform_vector3(Vec3::NEG_Z)
            .normalize_or(Vec3::NEG_Z);
        Self {
            pixel_width,
            pixel_height,
            view_matrix,
            projection_matrix,
            forward,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_render_scale(mut self, render_scale: f32) -> Self {
        self.render_scale = render_scale;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: CameraKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_post_processing(mut self, enabled: bool) -> Self {
        self.post_processing = enabled;
        self
    }
}

/// Per-frame camera state derived once and uploaded as kernel uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrameState {
    pub render_scale: f32,
    /// Screen size after render scale (may be fractional).
    pub screen_width: f32,
    pub screen_height: f32,
    pub view_matrix: Mat4,
    pub inverse_view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub inverse_projection_matrix: Mat4,
    pub view_direction: Vec3,
}

impl CameraFrameState {
    #[must_use]
    pub fn from_camera(camera: &CameraData) -> Self {
        let render_scale = match camera.kind {
            CameraKind::SceneView => 1.0,
            CameraKind::Game => camera.render_scale,
        };

        Self {
            render_scale,
            screen_width: camera.pixel_width as f32 * render_scale,
            screen_height: camera.pixel_height as f32 * render_scale,
            view_matrix: camera.view_matrix,
            inverse_view_matrix: camera.view_matrix.inverse(),
            projection_matrix: camera.projection_matrix,
            inverse_projection_matrix: camera.projection_matrix.inverse(),
            view_direction: camera.forward,
        }
    }
}
