//! Resolution planning for the reflection buffer.
//!
//! Raymarch cost scales with the number of reflection-buffer pixels rather
//! than with march length, so the buffer is shrunk by `downsample + 1`.
//! Sizes are ceiling-rounded: any non-empty screen yields at least 1×1.

/// Integer texture extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    #[must_use]
    pub fn as_vec2(&self) -> glam::Vec2 {
        glam::Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Maximum mip levels requested for the scene copy.
pub const SCENE_COPY_MAX_MIPS: u32 = 8;

/// Working resolution for a screen of `screen_width × screen_height`
/// (post render scale) and a downsample factor in `{0, 1, 2}`.
///
/// Returns `None` for degenerate screens (zero, negative or non-finite).
/// Factors above 2 are treated as 2.
#[must_use]
pub fn plan_working_resolution(screen_width: f32, screen_height: f32, downsample: u32) -> Option<Extent> {
    let valid = |v: f32| v.is_finite() && v > 0.0;
    if !valid(screen_width) || !valid(screen_height) {
        return None;
    }

    let scale = (downsample.min(2) + 1) as f32;
    let width = (screen_width / scale).ceil().max(1.0);
    let height = (screen_height / scale).ceil().max(1.0);

    Some(Extent::new(width as u32, height as u32))
}

/// Mip count for the full-resolution scene copy, clamped to the longest
/// chain the extent supports.
#[must_use]
pub fn scene_copy_mip_count(extent: Extent) -> u32 {
    let longest = extent.width.max(extent.height).max(1);
    let full_chain = 32 - longest.leading_zeros();
    full_chain.min(SCENE_COPY_MAX_MIPS)
}
