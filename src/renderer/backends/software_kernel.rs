//! CPU reference implementation of the SSR kernel.
//!
//! Mirrors `fs_trace` / `fs_compose` in `ssr.wgsl` texel for texel, so the
//! whole stage can be exercised without a GPU.
//!
//! # Trace termination
//!
//! | Condition                                          | Result     |
//! |----------------------------------------------------|------------|
//! | background depth (`>= 1`)                          | miss       |
//! | smoothness `< min_smoothness`                      | miss       |
//! | step count reaches `num_steps`                     | miss       |
//! | ray leaves `[0,1]²` or the `[0,1]` depth range     | miss       |
//! | ray behind scene by `(ε, 2·stride + bias)`          | hit        |
//!
//! A miss is the sentinel `(0, 0, 0, 0)`.

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::renderer::backends::software::{GBuffer, SoftwareTexture};
use crate::resources::ssr::SsrUniforms;

/// Minimum ray-behind-surface distance that counts as a hit.
pub const SELF_HIT_EPSILON: f32 = 1e-3;
/// Added to the `2 · stride` thickness window.
pub const THICKNESS_BIAS: f32 = 1e-4;
/// Width of the screen-border fade, in UV units.
pub const EDGE_FADE: f32 = 0.1;

/// The "no reflection" value.
pub const NO_HIT: Vec4 = Vec4::ZERO;

/// UV of the center of pixel `(x, y)` in a `width × height` image.
#[inline]
#[must_use]
pub fn pixel_uv(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    Vec2::new(
        (x as f32 + 0.5) / width as f32,
        (y as f32 + 0.5) / height as f32,
    )
}

/// Reconstructs a view-space position from screen UV and NDC depth.
#[inline]
#[must_use]
pub fn unproject(inverse_projection: &Mat4, uv: Vec2, depth: f32) -> Vec3 {
    let ndc = Vec4::new(uv.x * 2.0 - 1.0, (1.0 - uv.y) * 2.0 - 1.0, depth, 1.0);
    let view = *inverse_projection * ndc;
    view.xyz() / view.w
}

#[inline]
fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

#[inline]
fn edge_fade(uv: Vec2) -> f32 {
    let d = uv.x.min(1.0 - uv.x).min(uv.y.min(1.0 - uv.y));
    (d / EDGE_FADE).clamp(0.0, 1.0)
}

fn on_screen(uv: Vec2, ndc_depth: f32) -> bool {
    (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y) && (0.0..=1.0).contains(&ndc_depth)
}

/// Kernel pass 0 for one reflection-map texel.
#[must_use]
pub fn trace_texel(uniforms: &SsrUniforms, source: &SoftwareTexture, gbuffer: &GBuffer, uv: Vec2) -> Vec4 {
    let (x, y) = gbuffer.texel_coord(uv);
    let depth = gbuffer.depth_at(x, y);
    if depth >= 1.0 {
        return NO_HIT;
    }

    let surface = gbuffer.normal_at(x, y);
    let smoothness = surface.w;
    if smoothness < uniforms.min_smoothness {
        return NO_HIT;
    }

    let inverse_projection = &uniforms.inverse_projection_matrix;
    let origin = unproject(inverse_projection, uv, depth);
    let view_ray = (unproject(inverse_projection, uv, 1.0) - unproject(inverse_projection, uv, 0.0)).normalize_or_zero();
    let ray = reflect(view_ray, surface.xyz().normalize_or_zero());
    if ray.length_squared() == 0.0 {
        return NO_HIT;
    }

    // `as` saturates: NaN → 0, huge → u32::MAX.
    let step_limit = uniforms.num_steps.ceil() as u32;
    for step in 1..=step_limit {
        let i = step as f32;
        let pos = origin + ray * (uniforms.stride * i);

        let clip = uniforms.projection_matrix * pos.extend(1.0);
        if clip.w <= 0.0 {
            return NO_HIT;
        }
        let ndc = clip.xyz() / clip.w;
        let hit_uv = Vec2::new(ndc.x * 0.5 + 0.5, 1.0 - (ndc.y * 0.5 + 0.5));
        if !on_screen(hit_uv, ndc.z) {
            return NO_HIT;
        }

        let (hx, hy) = gbuffer.texel_coord(hit_uv);
        let scene_depth = gbuffer.depth_at(hx, hy);
        if scene_depth >= 1.0 {
            continue;
        }

        let scene_pos = unproject(inverse_projection, hit_uv, scene_depth);
        let delta = scene_pos.z - pos.z;
        if delta > SELF_HIT_EPSILON && delta < uniforms.stride * 2.0 + THICKNESS_BIAS {
            let color = source.sample_point(hit_uv, 0).xyz();
            let fade = (1.0 - i / uniforms.num_steps.max(1.0)).clamp(0.0, 1.0);
            return color.extend(smoothness * edge_fade(hit_uv) * fade);
        }
    }

    NO_HIT
}

/// Kernel pass 1 for one output texel.
///
/// Sentinel (or any non-positive alpha) returns `base` untouched.
#[inline]
#[must_use]
pub fn compose_texel(base: Vec4, reflection: Vec4) -> Vec4 {
    if reflection.w <= 0.0 {
        return base;
    }
    base.xyz().lerp(reflection.xyz(), reflection.w).extend(base.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_keeps_base_bits_for_sentinel() {
        let base = Vec4::new(0.123_456_7, f32::MIN_POSITIVE, 7.5, 0.25);
        let out = compose_texel(base, NO_HIT);
        assert_eq!(out.to_array().map(f32::to_bits), base.to_array().map(f32::to_bits));
    }

    #[test]
    fn compose_full_alpha_replaces_color_keeps_alpha() {
        let out = compose_texel(Vec4::new(1.0, 0.0, 0.0, 0.5), Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(out, Vec4::new(0.0, 1.0, 0.0, 0.5));
    }

    #[test]
    fn unproject_inverts_orthographic_projection() {
        let proj = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        let p = unproject(&proj.inverse(), Vec2::new(0.5, 0.5), 0.0);
        assert!((p.z + 0.1).abs() < 1e-5);
    }
}
