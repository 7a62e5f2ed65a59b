//! wgpu Backend
//!
//! [`WgpuDevice`] executes a recorded [`CommandBuffer`] on a `wgpu` device.
//!
//! | Command          | GPU work                                                    |
//! |------------------|-------------------------------------------------------------|
//! | `AllocateTarget` | [`TransientTexturePool::acquire`]                           |
//! | `ReleaseTarget`  | [`TransientTexturePool::release`]                           |
//! | `Blit`           | `copy_texture_to_texture` + [`MipmapGenerator::generate`]   |
//! | `UploadUniforms` | `queue.write_buffer` into the material's uniform buffer     |
//! | `DrawPass`       | fullscreen triangle with `fs_trace` or `fs_compose`         |
//!
//! # Host requirements
//!
//! - The camera color texture is imported with
//!   `RENDER_ATTACHMENT | TEXTURE_BINDING | COPY_SRC | COPY_DST` usage and a
//!   filterable format.
//! - Depth (a depth format), normal (`xyz` + smoothness in `w`) and motion
//!   views are set with [`WgpuDevice::set_frame_inputs`] before submission.
//! - Uniform uploads are written through the queue, so each camera's command
//!   buffer is submitted on its own ([`WgpuDevice::submit`] does one queue
//!   submission per call).

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::errors::{Result, SsrError};
use crate::renderer::backends::mipmap::MipmapGenerator;
use crate::renderer::backends::transient_pool::TransientTexturePool;
use crate::renderer::graph::commands::{CommandBuffer, KernelPass, MaterialId, RenderCommand, TextureId};
use crate::renderer::graph::context::{CameraTargetDescriptor, FrameContext, PassInputs};
use crate::renderer::graph::frame_targets::{FilterMode, HDR_TEXTURE_FORMAT};
use crate::renderer::pipeline::shader_library::{
    COMPOSE_ENTRY, ShaderHandle, ShaderLibrary, ShaderProvider, TRACE_ENTRY, VERTEX_ENTRY,
};
use crate::resources::ssr::SsrUniforms;
use crate::scene::camera::CameraData;

const UNIFORM_SIZE: u64 = std::mem::size_of::<SsrUniforms>() as u64;

/// Per-frame depth / normal / motion views supplied by the host.
#[derive(Debug, Clone)]
pub struct FrameInputViews {
    pub depth: wgpu::TextureView,
    pub normal: wgpu::TextureView,
    pub motion: wgpu::TextureView,
}

struct ImportedTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    base_view: wgpu::TextureView,
}

struct WgpuMaterial {
    shader: String,
    module: wgpu::ShaderModule,
    uniform_buffer: wgpu::Buffer,
    pipelines: FxHashMap<(KernelPass, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

/// Everything a command needs to know about one texture.
struct ResolvedTexture {
    texture: wgpu::Texture,
    sample_view: wgpu::TextureView,
    attachment_view: wgpu::TextureView,
    filter: FilterMode,
}

/// GPU executor for recorded SSR command buffers.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    library: ShaderLibrary,
    pool: TransientTexturePool,
    mipmaps: MipmapGenerator,

    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    /// Bound as the overlay of the trace pass.
    dummy_overlay: wgpu::TextureView,

    materials: FxHashMap<MaterialId, WgpuMaterial>,
    next_material: u32,
    imported: FxHashMap<u32, ImportedTexture>,
    next_imported: u32,
    frame_inputs: Option<FrameInputViews>,
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Runs `create` inside a validation error scope and returns what it built,
/// or the captured validation error as its message.
fn capture_validation<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> std::result::Result<T, String> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(scope.pop()) {
        Some(err) => Err(err.to_string()),
        None => Ok(value),
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &str,
    module: &wgpu::ShaderModule,
    pass: KernelPass,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    let fragment_entry = match pass {
        KernelPass::Trace => TRACE_ENTRY,
        KernelPass::Compose => COMPOSE_ENTRY,
    };

    log::debug!("Creating SSR {pass:?} pipeline for `{shader}` ({format:?})");
    capture_validation(device, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("SSR {pass:?} Pipeline")),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    })
    .map_err(|reason| SsrError::MaterialCreation {
        shader: shader.to_owned(),
        reason,
    })
}

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self::with_library(device, queue, ShaderLibrary::new())
    }

    #[must_use]
    pub fn with_library(device: wgpu::Device, queue: wgpu::Queue, library: ShaderLibrary) -> Self {
        // Binding layout matches `ssr.wgsl`.
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SSR Layout"),
            entries: &[
                // Binding 0: Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(UNIFORM_SIZE),
                    },
                    count: None,
                },
                // Binding 1: Source color
                texture_entry(1, wgpu::TextureSampleType::Float { filterable: true }),
                // Binding 2: Overlay (reflection map)
                texture_entry(2, wgpu::TextureSampleType::Float { filterable: true }),
                // Binding 3: Scene depth, read as unfilterable float
                texture_entry(3, wgpu::TextureSampleType::Float { filterable: false }),
                // Binding 4: Normal + smoothness
                texture_entry(4, wgpu::TextureSampleType::Float { filterable: false }),
                // Binding 5: Motion vectors
                texture_entry(5, wgpu::TextureSampleType::Float { filterable: false }),
                // Binding 6: Point sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
                // Binding 7: Overlay sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 7,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SSR Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });

        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSR Point Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SSR Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let dummy_overlay = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("SSR Dummy Overlay"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: HDR_TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mipmaps = MipmapGenerator::new(&device);

        Self {
            device,
            queue,
            library,
            pool: TransientTexturePool::new(),
            mipmaps,
            layout,
            pipeline_layout,
            point_sampler,
            linear_sampler,
            dummy_overlay,
            materials: FxHashMap::default(),
            next_material: 0,
            imported: FxHashMap::default(),
            next_imported: 0,
            frame_inputs: None,
        }
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[must_use]
    pub fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.library
    }

    #[must_use]
    pub fn pool(&self) -> &TransientTexturePool {
        &self.pool
    }

    /// Drops pooled targets unused for more than `max_idle_frames` calls.
    pub fn trim_pool(&mut self, max_idle_frames: u32) {
        self.pool.trim(max_idle_frames);
    }

    /// Registers a host-owned texture.
    pub fn import_texture(&mut self, texture: wgpu::Texture) -> TextureId {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let base_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("SSR Imported Base"),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let id = self.next_imported;
        self.next_imported += 1;
        self.imported.insert(
            id,
            ImportedTexture {
                texture,
                view,
                base_view,
            },
        );
        TextureId::Imported(id)
    }

    pub fn remove_imported(&mut self, id: TextureId) -> Option<wgpu::Texture> {
        match id {
            TextureId::Imported(raw) => self.imported.remove(&raw).map(|t| t.texture),
            TextureId::Transient(_) => None,
        }
    }

    #[must_use]
    pub fn imported_texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        match id {
            TextureId::Imported(raw) => self.imported.get(&raw).map(|t| &t.texture),
            TextureId::Transient(_) => None,
        }
    }

    /// Size and format of an imported texture, as a camera target.
    #[must_use]
    pub fn color_descriptor(&self, id: TextureId) -> Option<CameraTargetDescriptor> {
        self.imported_texture(id).map(|t| CameraTargetDescriptor {
            width: t.width(),
            height: t.height(),
            format: t.format(),
        })
    }

    pub fn set_frame_inputs(&mut self, inputs: FrameInputViews) {
        self.frame_inputs = Some(inputs);
    }

    pub fn clear_frame_inputs(&mut self) {
        self.frame_inputs = None;
    }

    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Starts recording one camera against `color`.
    pub fn begin_frame(&mut self, camera: CameraData, color: TextureId) -> WgpuFrame<'_> {
        WgpuFrame {
            device: self,
            camera,
            color,
            commands: CommandBuffer::new("SSR wgpu Frame"),
            requested: PassInputs::empty(),
        }
    }

    fn resolve(&self, id: TextureId) -> Result<ResolvedTexture> {
        match id {
            TextureId::Imported(raw) => self
                .imported
                .get(&raw)
                .map(|t| ResolvedTexture {
                    texture: t.texture.clone(),
                    sample_view: t.view.clone(),
                    attachment_view: t.base_view.clone(),
                    filter: FilterMode::Bilinear,
                })
                .ok_or(SsrError::UnknownTexture(id)),
            TextureId::Transient(t) => self
                .pool
                .get(t)
                .map(|p| ResolvedTexture {
                    texture: p.texture().clone(),
                    sample_view: p.view().clone(),
                    attachment_view: p.base_view().clone(),
                    filter: p.desc().filter,
                })
                .ok_or(SsrError::UnknownTexture(id)),
        }
    }

    /// Executes and drains `commands` as one queue submission.
    ///
    /// After the first failing command only releases are still executed, so
    /// pooled targets always return to the pool. The first error is returned.
    pub fn submit(&mut self, commands: &mut CommandBuffer) -> Result<()> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(commands.label()),
        });

        let mut first_error = None;
        for command in commands.take() {
            let is_release = matches!(command, RenderCommand::ReleaseTarget { .. });
            if first_error.is_some() && !is_release {
                continue;
            }
            if let Err(err) = self.execute(&mut encoder, command) {
                log::error!("wgpu SSR command failed: {err}");
                first_error.get_or_insert(err);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        first_error.map_or(Ok(()), Err)
    }

    fn execute(&mut self, encoder: &mut wgpu::CommandEncoder, command: RenderCommand) -> Result<()> {
        match command {
            RenderCommand::AllocateTarget { id, desc } => self.pool.acquire(&self.device, id, &desc),
            RenderCommand::ReleaseTarget { id } => self.pool.release(id),
            RenderCommand::Blit { source, destination } => self.blit(encoder, source, destination),
            RenderCommand::UploadUniforms { material, uniforms } => {
                let entry = self
                    .materials
                    .get(&material)
                    .ok_or(SsrError::UnknownMaterial(material))?;
                self.queue.write_buffer(&entry.uniform_buffer, 0, uniforms.as_bytes());
                Ok(())
            }
            RenderCommand::DrawPass {
                material,
                pass,
                source,
                overlay,
                destination,
            } => self.draw(encoder, material, pass, source, overlay, destination),
        }
    }

    fn blit(&mut self, encoder: &mut wgpu::CommandEncoder, source: TextureId, destination: TextureId) -> Result<()> {
        let src = self.resolve(source)?.texture;
        let dst = self.resolve(destination)?.texture;
        if src.width() != dst.width() || src.height() != dst.height() {
            return Err(SsrError::Unsupported(format!(
                "blit between {}x{} and {}x{} textures",
                src.width(),
                src.height(),
                dst.width(),
                dst.height()
            )));
        }

        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: dst.width(),
                height: dst.height(),
                depth_or_array_layers: 1,
            },
        );

        self.mipmaps.generate(&self.device, encoder, &dst);
        Ok(())
    }

    fn pipeline(&mut self, material: MaterialId, pass: KernelPass, format: wgpu::TextureFormat) -> Result<wgpu::RenderPipeline> {
        let entry = self
            .materials
            .get_mut(&material)
            .ok_or(SsrError::UnknownMaterial(material))?;

        if let Some(pipeline) = entry.pipelines.get(&(pass, format)) {
            return Ok(pipeline.clone());
        }

        let pipeline = build_pipeline(&self.device, &self.pipeline_layout, &entry.shader, &entry.module, pass, format)?;
        entry.pipelines.insert((pass, format), pipeline.clone());
        Ok(pipeline)
    }

    fn draw(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        material: MaterialId,
        pass: KernelPass,
        source: TextureId,
        overlay: Option<TextureId>,
        destination: TextureId,
    ) -> Result<()> {
        let inputs = self.frame_inputs.clone().ok_or(SsrError::MissingFrameInputs)?;

        let target = self.resolve(destination)?;
        let source_view = self.resolve(source)?.sample_view;
        let (overlay_view, overlay_filter) = match overlay {
            Some(id) => {
                let resolved = self.resolve(id)?;
                (resolved.sample_view, resolved.filter)
            }
            None => (self.dummy_overlay.clone(), FilterMode::Point),
        };

        let pipeline = self.pipeline(material, pass, target.texture.format())?;
        let uniform_buffer = &self
            .materials
            .get(&material)
            .ok_or(SsrError::UnknownMaterial(material))?
            .uniform_buffer;

        let overlay_sampler = match overlay_filter {
            FilterMode::Point => &self.point_sampler,
            FilterMode::Bilinear | FilterMode::Trilinear => &self.linear_sampler,
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSR BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&overlay_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&inputs.depth),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&inputs.normal),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&inputs.motion),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(overlay_sampler),
                },
            ],
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(match pass {
                    KernelPass::Trace => "SSR Trace Pass",
                    KernelPass::Compose => "SSR Compose Pass",
                }),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.attachment_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                ..Default::default()
            });

            rpass.set_pipeline(&pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        self.mipmaps.generate(&self.device, encoder, &target.texture);
        Ok(())
    }
}

impl ShaderProvider for WgpuDevice {
    fn find_shader(&self, name: &str) -> Option<ShaderHandle> {
        self.library.find(name)
    }

    fn create_material(&mut self, shader: &ShaderHandle) -> Result<MaterialId> {
        shader.validate_entry_points()?;

        let material_error = |reason| SsrError::MaterialCreation {
            shader: shader.name().to_owned(),
            reason,
        };
        let module = capture_validation(&self.device, || {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.name()),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(shader.source().to_owned())),
            })
        })
        .map_err(material_error)?;

        // Pre-built for HDR targets; other target formats are built on first draw.
        let mut pipelines = FxHashMap::default();
        for pass in [KernelPass::Trace, KernelPass::Compose] {
            let pipeline = build_pipeline(
                &self.device,
                &self.pipeline_layout,
                shader.name(),
                &module,
                pass,
                HDR_TEXTURE_FORMAT,
            )?;
            pipelines.insert((pass, HDR_TEXTURE_FORMAT), pipeline);
        }

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSR Uniforms"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let id = MaterialId::new(self.next_material);
        self.next_material += 1;
        self.materials.insert(
            id,
            WgpuMaterial {
                shader: shader.name().to_owned(),
                module,
                uniform_buffer,
                pipelines,
            },
        );
        Ok(id)
    }

    fn destroy_material(&mut self, material: MaterialId) {
        if let Some(entry) = self.materials.remove(&material) {
            entry.uniform_buffer.destroy();
        }
    }
}

/// [`FrameContext`] for one camera rendered on a [`WgpuDevice`].
pub struct WgpuFrame<'a> {
    device: &'a mut WgpuDevice,
    camera: CameraData,
    color: TextureId,
    commands: CommandBuffer,
    requested: PassInputs,
}

impl WgpuFrame<'_> {
    #[must_use]
    pub fn requested_inputs(&self) -> PassInputs {
        self.requested
    }

    #[must_use]
    pub fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    /// Submits the recorded commands to the GPU.
    pub fn finish(mut self) -> Result<()> {
        self.device.submit(&mut self.commands)
    }
}

impl FrameContext for WgpuFrame<'_> {
    fn camera(&self) -> &CameraData {
        &self.camera
    }

    fn color_target(&self) -> TextureId {
        self.color
    }

    fn color_descriptor(&self) -> CameraTargetDescriptor {
        self.device
            .color_descriptor(self.color)
            .unwrap_or(CameraTargetDescriptor {
                width: 0,
                height: 0,
                format: HDR_TEXTURE_FORMAT,
            })
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
}
