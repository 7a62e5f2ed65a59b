//! Transient Texture Pool
//!
//! Backs the SSR stage's per-frame targets on the GPU. The recorded command
//! stream allocates and releases both targets every frame; the pool turns
//! that churn into reuse of textures keyed by size, format and mip count.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │               TransientTexturePool                    │
//! │                                                       │
//! │  active: Map<TransientTextureId, PooledTexture>        │
//! │  free:   Map<PoolKey, Vec<PooledTexture>>              │
//! │                                                       │
//! │  acquire(id, desc)   AllocateTarget                   │
//! │  release(id)         ReleaseTarget                    │
//! │  trim(n)             after resize                     │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Textures are never destroyed on release. Call [`TransientTexturePool::trim`]
//! once per frame (or after a resolution change) to drop sizes that stopped
//! being requested.

use rustc_hash::FxHashMap;

use crate::errors::{Result, SsrError};
use crate::renderer::graph::commands::{TextureId, TransientTextureId};
use crate::renderer::graph::frame_targets::TargetDesc;

/// Usages every SSR target needs: rendered to, sampled, blitted in and out.
pub const TARGET_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

#[derive(Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    mip_level_count: u32,
}

impl PoolKey {
    fn from_desc(desc: &TargetDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            mip_level_count: desc.mip_level_count,
        }
    }
}

/// A pooled texture with its pre-built views.
pub struct PooledTexture {
    texture: wgpu::Texture,
    /// Full-texture, all-mips view.
    default_view: wgpu::TextureView,
    /// Level-0 only; render attachments must name a single mip.
    base_view: wgpu::TextureView,
    desc: TargetDesc,
    /// Frames spent in the free list without reuse.
    idle_frames: u32,
}

impl PooledTexture {
    fn new(device: &wgpu::Device, desc: &TargetDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: TARGET_USAGE,
            view_formats: &[],
        });

        let default_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let base_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });

        Self {
            texture,
            default_view,
            base_view,
            desc: desc.clone(),
            idle_frames: 0,
        }
    }

    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.default_view
    }

    #[must_use]
    pub fn base_view(&self) -> &wgpu::TextureView {
        &self.base_view
    }

    #[must_use]
    pub fn desc(&self) -> &TargetDesc {
        &self.desc
    }
}

/// Size-keyed GPU texture pool for the stage's transient targets.
#[derive(Default)]
pub struct TransientTexturePool {
    active: FxHashMap<TransientTextureId, PooledTexture>,
    free: FxHashMap<PoolKey, Vec<PooledTexture>>,
    created: usize,
}

impl TransientTexturePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` to a texture matching `desc`, reusing a free one if possible.
    pub fn acquire(&mut self, device: &wgpu::Device, id: TransientTextureId, desc: &TargetDesc) -> Result<()> {
        if self.active.contains_key(&id) {
            return Err(SsrError::Unsupported(format!(
                "transient target {} is already allocated",
                id.to_u32()
            )));
        }

        let key = PoolKey::from_desc(desc);
        let reused = self.free.get_mut(&key).and_then(Vec::pop);
        let mut pooled = if let Some(t) = reused {
            t
        } else {
            log::debug!(
                "Transient pool: creating {} {}x{} {:?} ({} mips)",
                desc.label,
                desc.width,
                desc.height,
                desc.format,
                desc.mip_level_count
            );
            self.created += 1;
            PooledTexture::new(device, desc)
        };
        pooled.idle_frames = 0;
        pooled.desc.label = desc.label;
        pooled.desc.filter = desc.filter;

        self.active.insert(id, pooled);
        Ok(())
    }

    /// Returns `id`'s texture to the free list.
    pub fn release(&mut self, id: TransientTextureId) -> Result<()> {
        let pooled = self
            .active
            .remove(&id)
            .ok_or(SsrError::UnknownTexture(TextureId::Transient(id)))?;
        let key = PoolKey::from_desc(&pooled.desc);
        self.free.entry(key).or_default().push(pooled);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: TransientTextureId) -> Option<&PooledTexture> {
        self.active.get(&id)
    }

    /// Drops free textures idle for more than `max_idle_frames` calls.
    pub fn trim(&mut self, max_idle_frames: u32) {
        let before = self.free_count();
        for bucket in self.free.values_mut() {
            for t in bucket.iter_mut() {
                t.idle_frames += 1;
            }
            bucket.retain(|t| t.idle_frames <= max_idle_frames);
        }
        self.free.retain(|_, bucket| !bucket.is_empty());

        let dropped = before - self.free_count();
        if dropped > 0 {
            log::debug!("Transient pool: trimmed {dropped} idle textures");
        }
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Textures managed by the pool (active and free).
    #[must_use]
    pub fn total_texture_count(&self) -> usize {
        self.active_count() + self.free_count()
    }

    /// Textures ever created by the pool.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created
    }
}
