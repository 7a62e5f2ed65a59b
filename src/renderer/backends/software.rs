//! CPU Reference Backend
//!
//! [`SoftwareDevice`] executes a recorded [`CommandBuffer`] on `Vec4` images
//! using the kernel in [`software_kernel`](super::software_kernel). It is the
//! backend the integration tests and the headless demo run on.
//!
//! # Resource model
//!
//! | Handle                    | Storage                    | Owner         |
//! |---------------------------|----------------------------|---------------|
//! | `TextureId::Imported(n)`  | `imported[n]`              | host          |
//! | `TextureId::Transient(t)` | `transient[t]`             | SSR stage     |
//! | `MaterialId`              | `materials[m]`             | SSR feature   |
//! | depth / normal / motion   | [`GBuffer`] (one at a time) | host, per frame |
//!
//! Every image holds `f32` texels regardless of its declared format.

use glam::{Vec2, Vec4};
use rustc_hash::FxHashMap;

use crate::errors::{Result, SsrError};
use crate::renderer::backends::software_kernel::{compose_texel, pixel_uv, trace_texel};
use crate::renderer::graph::commands::{
    CommandBuffer, KernelPass, MaterialId, RenderCommand, TextureId, TransientTextureId,
};
use crate::renderer::graph::context::{CameraTargetDescriptor, FrameContext, PassInputs};
use crate::renderer::graph::frame_targets::{FilterMode, TargetDesc};
use crate::renderer::pipeline::shader_library::{ShaderHandle, ShaderLibrary, ShaderProvider};
use crate::resources::ssr::SsrUniforms;
use crate::scene::camera::CameraData;

// ============================================================================
// SoftwareTexture
// ============================================================================

/// A 2D image with an optional box-filtered mip chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareTexture {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    filter: FilterMode,
    levels: Vec<Vec<Vec4>>,
}

fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    ((width >> level).max(1), (height >> level).max(1))
}

impl SoftwareTexture {
    /// Zero-filled single-level texture.
    #[must_use]
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self::filled(width, height, format, Vec4::ZERO)
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, format: wgpu::TextureFormat, color: Vec4) -> Self {
        Self {
            width,
            height,
            format,
            filter: FilterMode::Point,
            levels: vec![vec![color; (width * height) as usize]],
        }
    }

    /// Single-level texture from row-major texels.
    pub fn from_pixels(width: u32, height: u32, format: wgpu::TextureFormat, pixels: Vec<Vec4>) -> Result<Self> {
        let expected = (width * height) as usize;
        if pixels.len() != expected {
            return Err(SsrError::InvalidFrameInputs(format!(
                "texture data has {} texels, expected {expected} for {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            filter: FilterMode::Point,
            levels: vec![pixels],
        })
    }

    /// Zero-filled texture matching a target descriptor, mips included.
    #[must_use]
    pub fn from_desc(desc: &TargetDesc) -> Self {
        let levels = (0..desc.mip_level_count.max(1))
            .map(|level| {
                let (w, h) = level_extent(desc.width, desc.height, level);
                vec![Vec4::ZERO; (w * h) as usize]
            })
            .collect();
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            filter: desc.filter,
            levels,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[must_use]
    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    #[must_use]
    pub fn mip_level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Level-0 texels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[Vec4] {
        &self.levels[0]
    }

    #[must_use]
    pub fn level(&self, level: u32) -> Option<&[Vec4]> {
        self.levels.get(level as usize).map(Vec::as_slice)
    }

    #[inline]
    #[must_use]
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        self.levels[0][(y * self.width + x) as usize]
    }

    pub fn set_texel(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.levels[0][index] = value;
    }

    /// Nearest-texel lookup in `level`, clamped to the edge.
    #[must_use]
    pub fn sample_point(&self, uv: Vec2, level: u32) -> Vec4 {
        let level = level.min(self.mip_level_count() - 1);
        let (w, h) = level_extent(self.width, self.height, level);
        if w == 0 || h == 0 {
            return Vec4::ZERO;
        }
        let x = ((uv.x * w as f32).floor() as i64).clamp(0, i64::from(w) - 1) as u32;
        let y = ((uv.y * h as f32).floor() as i64).clamp(0, i64::from(h) - 1) as u32;
        self.levels[level as usize][(y * w + x) as usize]
    }

    /// Bilinear lookup in level 0, clamped to the edge.
    #[must_use]
    pub fn sample_bilinear(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ZERO;
        }
        let max_x = self.width as f32 - 1.0;
        let max_y = self.height as f32 - 1.0;
        let fx = (uv.x * self.width as f32 - 0.5).clamp(0.0, max_x);
        let fy = (uv.y * self.height as f32 - 0.5).clamp(0.0, max_y);
        let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), tx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), tx);
        top.lerp(bottom, ty)
    }

    /// Lookup using the texture's own filter mode.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        match self.filter {
            FilterMode::Point => self.sample_point(uv, 0),
            FilterMode::Bilinear | FilterMode::Trilinear => self.sample_bilinear(uv),
        }
    }

    /// Replaces level 0 and rebuilds the mip chain.
    fn write_level0(&mut self, pixels: Vec<Vec4>) {
        self.levels[0] = pixels;
        self.generate_mips();
    }

    /// Copies `source` into level 0 (exactly when sizes match, nearest
    /// otherwise) and rebuilds the mip chain.
    fn copy_from(&mut self, source: &SoftwareTexture) {
        let pixels = if source.width == self.width && source.height == self.height {
            source.levels[0].clone()
        } else {
            let (w, h) = (self.width, self.height);
            (0..h)
                .flat_map(|y| (0..w).map(move |x| (x, y)))
                .map(|(x, y)| source.sample_point(pixel_uv(x, y, w, h), 0))
                .collect()
        };
        self.write_level0(pixels);
    }

    /// 2×2 box filter down the chain.
    fn generate_mips(&mut self) {
        for level in 1..self.levels.len() {
            let (sw, sh) = level_extent(self.width, self.height, level as u32 - 1);
            let (dw, dh) = level_extent(self.width, self.height, level as u32);
            let (upper, lower) = self.levels.split_at_mut(level);
            let src = &upper[level - 1];
            let dst = &mut lower[0];
            for y in 0..dh {
                for x in 0..dw {
                    let (x0, y0) = ((x * 2).min(sw - 1), (y * 2).min(sh - 1));
                    let (x1, y1) = ((x * 2 + 1).min(sw - 1), (y * 2 + 1).min(sh - 1));
                    let sum = src[(y0 * sw + x0) as usize]
                        + src[(y0 * sw + x1) as usize]
                        + src[(y1 * sw + x0) as usize]
                        + src[(y1 * sw + x1) as usize];
                    dst[(y * dw + x) as usize] = sum * 0.25;
                }
            }
        }
    }
}

// ============================================================================
// GBuffer
// ============================================================================

/// Per-frame depth, normal and motion inputs of the trace pass.
#[derive(Debug, Clone, PartialEq)]
pub struct GBuffer {
    width: u32,
    height: u32,
    /// NDC depth in `[0, 1]`; `1` is background.
    depth: Vec<f32>,
    /// View-space normal in `xyz`, smoothness in `w`.
    normals: Vec<Vec4>,
    motion: Vec<Vec2>,
}

impl GBuffer {
    pub fn new(width: u32, height: u32, depth: Vec<f32>, normals: Vec<Vec4>, motion: Vec<Vec2>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SsrError::InvalidFrameInputs(format!("empty gbuffer {width}x{height}")));
        }
        let expected = (width * height) as usize;
        for (name, len) in [("depth", depth.len()), ("normal", normals.len()), ("motion", motion.len())] {
            if len != expected {
                return Err(SsrError::InvalidFrameInputs(format!(
                    "{name} buffer has {len} texels, expected {expected}"
                )));
            }
        }
        Ok(Self {
            width,
            height,
            depth,
            normals,
            motion,
        })
    }

    /// All-background gbuffer: far depth, zero smoothness, no motion.
    pub fn background(width: u32, height: u32) -> Result<Self> {
        let count = (width * height) as usize;
        Self::new(
            width,
            height,
            vec![1.0; count],
            vec![Vec4::new(0.0, 0.0, 1.0, 0.0); count],
            vec![Vec2::ZERO; count],
        )
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Writes one surface sample.
    pub fn set(&mut self, x: u32, y: u32, depth: f32, normal: glam::Vec3, smoothness: f32) {
        let index = (y * self.width + x) as usize;
        self.depth[index] = depth;
        self.normals[index] = normal.extend(smoothness);
    }

    pub fn set_motion(&mut self, x: u32, y: u32, motion: Vec2) {
        let index = (y * self.width + x) as usize;
        self.motion[index] = motion;
    }

    /// Texel containing `uv`, clamped to the edge.
    #[inline]
    #[must_use]
    pub fn texel_coord(&self, uv: Vec2) -> (u32, u32) {
        let x = ((uv.x * self.width as f32).floor() as i64).clamp(0, i64::from(self.width) - 1);
        let y = ((uv.y * self.height as f32).floor() as i64).clamp(0, i64::from(self.height) - 1);
        (x as u32, y as u32)
    }

    #[inline]
    #[must_use]
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width + x) as usize]
    }

    #[inline]
    #[must_use]
    pub fn normal_at(&self, x: u32, y: u32) -> Vec4 {
        self.normals[(y * self.width + x) as usize]
    }

    #[inline]
    #[must_use]
    pub fn motion_at(&self, x: u32, y: u32) -> Vec2 {
        self.motion[(y * self.width + x) as usize]
    }
}

// ============================================================================
// SoftwareDevice
// ============================================================================

/// Counters of executed commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub allocations: usize,
    pub releases: usize,
    pub blits: usize,
    pub draws: usize,
    pub uniform_uploads: usize,
    pub materials_created: usize,
    pub materials_destroyed: usize,
    /// Highest number of transient targets alive at once.
    pub peak_live_targets: usize,
}

#[derive(Debug)]
struct SoftwareMaterial {
    shader: String,
    uniforms: Option<SsrUniforms>,
}

/// CPU executor for recorded SSR command buffers.
#[derive(Debug)]
pub struct SoftwareDevice {
    library: ShaderLibrary,
    materials: FxHashMap<MaterialId, SoftwareMaterial>,
    next_material: u32,
    imported: FxHashMap<u32, SoftwareTexture>,
    next_imported: u32,
    transient: FxHashMap<TransientTextureId, SoftwareTexture>,
    gbuffer: Option<GBuffer>,
    stats: DeviceStats,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    /// Device with the built-in shader library.
    #[must_use]
    pub fn new() -> Self {
        Self::with_library(ShaderLibrary::new())
    }

    #[must_use]
    pub fn with_library(library: ShaderLibrary) -> Self {
        Self {
            library,
            materials: FxHashMap::default(),
            next_material: 0,
            imported: FxHashMap::default(),
            next_imported: 0,
            transient: FxHashMap::default(),
            gbuffer: None,
            stats: DeviceStats::default(),
        }
    }

    #[must_use]
    pub fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.library
    }

    #[must_use]
    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Transient targets currently alive.
    #[must_use]
    pub fn live_targets(&self) -> usize {
        self.transient.len()
    }

    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Shader a material was built from.
    #[must_use]
    pub fn material_shader(&self, material: MaterialId) -> Option<&str> {
        self.materials.get(&material).map(|m| m.shader.as_str())
    }

    /// Last uniforms uploaded for `material`.
    #[must_use]
    pub fn material_uniforms(&self, material: MaterialId) -> Option<&SsrUniforms> {
        self.materials.get(&material).and_then(|m| m.uniforms.as_ref())
    }

    /// Hands a host-owned texture to the device.
    pub fn import_texture(&mut self, texture: SoftwareTexture) -> TextureId {
        let id = self.next_imported;
        self.next_imported += 1;
        self.imported.insert(id, texture);
        TextureId::Imported(id)
    }

    /// Replaces the contents of an imported texture.
    pub fn replace_imported(&mut self, id: TextureId, texture: SoftwareTexture) -> Result<()> {
        match id {
            TextureId::Imported(raw) if self.imported.contains_key(&raw) => {
                self.imported.insert(raw, texture);
                Ok(())
            }
            _ => Err(SsrError::UnknownTexture(id)),
        }
    }

    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&SoftwareTexture> {
        match id {
            TextureId::Imported(raw) => self.imported.get(&raw),
            TextureId::Transient(t) => self.transient.get(&t),
        }
    }

    fn texture_mut(&mut self, id: TextureId) -> Result<&mut SoftwareTexture> {
        let texture = match id {
            TextureId::Imported(raw) => self.imported.get_mut(&raw),
            TextureId::Transient(t) => self.transient.get_mut(&t),
        };
        texture.ok_or(SsrError::UnknownTexture(id))
    }

    fn texture_ref(&self, id: TextureId) -> Result<&SoftwareTexture> {
        self.texture(id).ok_or(SsrError::UnknownTexture(id))
    }

    /// Sets the depth / normal / motion inputs for subsequent trace draws.
    pub fn set_gbuffer(&mut self, gbuffer: GBuffer) {
        self.gbuffer = Some(gbuffer);
    }

    pub fn clear_gbuffer(&mut self) {
        self.gbuffer = None;
    }

    #[must_use]
    pub fn gbuffer(&self) -> Option<&GBuffer> {
        self.gbuffer.as_ref()
    }

    /// Starts recording one camera against `color`.
    pub fn begin_frame(&mut self, camera: CameraData, color: TextureId) -> SoftwareFrame<'_> {
        SoftwareFrame {
            device: self,
            camera,
            color,
            commands: CommandBuffer::new("SSR Software Frame"),
            requested: PassInputs::empty(),
            aborted: false,
        }
    }

    /// Executes and drains `commands`.
    ///
    /// After the first failing command the remaining commands are skipped
    /// except releases, so no transient target outlives the submission. The
    /// first error is returned.
    pub fn submit(&mut self, commands: &mut CommandBuffer) -> Result<()> {
        let mut first_error = None;
        for command in commands.take() {
            let is_release = matches!(command, RenderCommand::ReleaseTarget { .. });
            if first_error.is_some() && !is_release {
                continue;
            }
            if let Err(err) = self.execute(command) {
                log::error!("Software SSR command failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn execute(&mut self, command: RenderCommand) -> Result<()> {
        match command {
            RenderCommand::AllocateTarget { id, desc } => {
                if self.transient.contains_key(&id) {
                    return Err(SsrError::Unsupported(format!(
                        "transient target {} is already allocated",
                        id.to_u32()
                    )));
                }
                self.transient.insert(id, SoftwareTexture::from_desc(&desc));
                self.stats.allocations += 1;
                self.stats.peak_live_targets = self.stats.peak_live_targets.max(self.transient.len());
            }
            RenderCommand::ReleaseTarget { id } => {
                self.transient
                    .remove(&id)
                    .ok_or(SsrError::UnknownTexture(TextureId::Transient(id)))?;
                self.stats.releases += 1;
            }
            RenderCommand::Blit { source, destination } => {
                let source = self.texture_ref(source)?.clone();
                self.texture_mut(destination)?.copy_from(&source);
                self.stats.blits += 1;
            }
            RenderCommand::UploadUniforms { material, uniforms } => {
                let entry = self
                    .materials
                    .get_mut(&material)
                    .ok_or(SsrError::UnknownMaterial(material))?;
                entry.uniforms = Some(uniforms);
                self.stats.uniform_uploads += 1;
            }
            RenderCommand::DrawPass {
                material,
                pass,
                source,
                overlay,
                destination,
            } => {
                self.draw(material, pass, source, overlay, destination)?;
                self.stats.draws += 1;
            }
        }
        Ok(())
    }

    fn draw(
        &mut self,
        material: MaterialId,
        pass: KernelPass,
        source: TextureId,
        overlay: Option<TextureId>,
        destination: TextureId,
    ) -> Result<()> {
        let uniforms = self
            .materials
            .get(&material)
            .ok_or(SsrError::UnknownMaterial(material))?
            .uniforms
            .ok_or(SsrError::InvalidPassState {
                expected: "uniforms uploaded",
                found: "no uniforms",
            })?;

        let target = self.texture_ref(destination)?;
        let (w, h) = (target.width(), target.height());
        let src = self.texture_ref(source)?;

        let output: Vec<Vec4> = match pass {
            KernelPass::Trace => {
                let gbuffer = self.gbuffer.as_ref().ok_or(SsrError::MissingFrameInputs)?;
                (0..h)
                    .flat_map(|y| (0..w).map(move |x| (x, y)))
                    .map(|(x, y)| trace_texel(&uniforms, src, gbuffer, pixel_uv(x, y, w, h)))
                    .collect()
            }
            KernelPass::Compose => {
                let overlay_id = overlay.ok_or_else(|| {
                    SsrError::InvalidFrameInputs("compose pass requires a reflection overlay".to_owned())
                })?;
                let reflection = self.texture_ref(overlay_id)?;
                let same_size = src.width() == w && src.height() == h;
                (0..h)
                    .flat_map(|y| (0..w).map(move |x| (x, y)))
                    .map(|(x, y)| {
                        let uv = pixel_uv(x, y, w, h);
                        let base = if same_size { src.texel(x, y) } else { src.sample_point(uv, 0) };
                        compose_texel(base, reflection.sample(uv))
                    })
                    .collect()
            }
        };

        self.texture_mut(destination)?.write_level0(output);
        Ok(())
    }
}

impl ShaderProvider for SoftwareDevice {
    fn find_shader(&self, name: &str) -> Option<ShaderHandle> {
        self.library.find(name)
    }

    fn create_material(&mut self, shader: &ShaderHandle) -> Result<MaterialId> {
        shader.validate_entry_points()?;
        let id = MaterialId::new(self.next_material);
        self.next_material += 1;
        self.materials.insert(
            id,
            SoftwareMaterial {
                shader: shader.name().to_owned(),
                uniforms: None,
            },
        );
        self.stats.materials_created += 1;
        Ok(id)
    }

    fn destroy_material(&mut self, material: MaterialId) {
        if self.materials.remove(&material).is_some() {
            self.stats.materials_destroyed += 1;
        }
    }
}

// ============================================================================
// SoftwareFrame
// ============================================================================

/// [`FrameContext`] for one camera rendered on a [`SoftwareDevice`].
pub struct SoftwareFrame<'a> {
    device: &'a mut SoftwareDevice,
    camera: CameraData,
    color: TextureId,
    commands: CommandBuffer,
    requested: PassInputs,
    aborted: bool,
}

impl SoftwareFrame<'_> {
    /// Inputs the stage asked for so far.
    #[must_use]
    pub fn requested_inputs(&self) -> PassInputs {
        self.requested
    }

    /// Commands recorded so far.
    #[must_use]
    pub fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    /// Makes [`FrameContext::is_aborted`] report `true`.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Submits the recorded commands and returns them.
    pub fn finish(mut self) -> Result<Vec<RenderCommand>> {
        let recorded = self.commands.commands().to_vec();
        self.device.submit(&mut self.commands)?;
        Ok(recorded)
    }
}

impl FrameContext for SoftwareFrame<'_> {
    fn camera(&self) -> &CameraData {
        &self.camera
    }

    fn color_target(&self) -> TextureId {
        self.color
    }

    fn color_descriptor(&self) -> CameraTargetDescriptor {
        self.device.texture(self.color).map_or(
            CameraTargetDescriptor {
                width: 0,
                height: 0,
                format: wgpu::TextureFormat::Rgba16Float,
            },
            |t| CameraTargetDescriptor {
                width: t.width(),
                height: t.height(),
                format: t.format(),
            },
        )
    }

    fn request_inputs(&mut self, inputs: PassInputs) {
        self.requested |= inputs;
    }

    fn shaders(&mut self) -> &mut dyn ShaderProvider {
        &mut *self.device
    }

    fn command_buffer(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    fn is_aborted(&self) -> bool {
        self.aborted
    }
}
