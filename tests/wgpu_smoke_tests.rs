//! wgpu Backend Smoke Tests
//!
//! Runs the stage on a real adapter when one is available. Each test returns
//! early when the machine has no usable adapter (headless CI).

use glam::Mat4;

use myth_ssr::renderer::backends::wgpu_device::{FrameInputViews, WgpuDevice};
use myth_ssr::errors::SsrError;
use myth_ssr::renderer::feature::{CameraOutcome, SkipReason, SsrFeature};
use myth_ssr::resources::ssr_handle::SsrHandle;
use myth_ssr::scene::camera::CameraData;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 32;

fn create_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;

    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("SSR Smoke Test Device"),
        memory_hints: wgpu::MemoryHints::Performance,
        ..Default::default()
    }))
    .ok()
}

fn texture(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn frame_inputs(device: &wgpu::Device) -> FrameInputViews {
    let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT;
    let view = |t: wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());
    FrameInputViews {
        depth: view(texture(device, "Depth", wgpu::TextureFormat::Depth32Float, usage)),
        normal: view(texture(device, "Normals", wgpu::TextureFormat::Rgba16Float, usage)),
        motion: view(texture(device, "Motion", wgpu::TextureFormat::Rg16Float, usage)),
    }
}

fn setup() -> Option<(WgpuDevice, myth_ssr::renderer::graph::commands::TextureId)> {
    let (device, queue) = create_device()?;
    let color = texture(
        &device,
        "Camera Color",
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
    );
    let inputs = frame_inputs(&device);

    let mut ssr = WgpuDevice::new(device, queue);
    ssr.set_frame_inputs(inputs);
    let color = ssr.import_texture(color);
    Some((ssr, color))
}

fn camera() -> CameraData {
    let proj = Mat4::perspective_rh(60f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 100.0);
    CameraData::new(WIDTH, HEIGHT, Mat4::IDENTITY, proj)
}

#[test]
fn wgpu_frame_renders_and_returns_targets_to_pool() {
    let Some((mut device, color)) = setup() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };
    let mut feature = SsrFeature::new(SsrHandle::default());

    for _ in 0..3 {
        let mut frame = device.begin_frame(camera(), color);
        assert_eq!(feature.render_camera(&mut frame), CameraOutcome::Rendered);
        frame.finish().unwrap();
    }

    assert_eq!(device.pool().active_count(), 0);
    // Reflection map and scene copy are reused across frames.
    assert_eq!(device.pool().created_count(), 2);
    assert_eq!(device.pool().free_count(), 2);
    assert_eq!(device.material_count(), 1);

    device.trim_pool(0);
    assert_eq!(device.pool().total_texture_count(), 0);

    feature.dispose(&mut device);
    assert_eq!(device.material_count(), 0);

    assert!(device.remove_imported(color).is_some());
    assert!(device.color_descriptor(color).is_none());
}

#[test]
fn wgpu_uncompilable_shader_skips_camera() {
    let Some((mut device, color)) = setup() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };
    // Declares every entry point but does not parse.
    device.library_mut().register(
        "Custom/broken_ssr",
        "fn vs_main( { } fn fs_trace() {} fn fs_compose() {} garbage",
    );

    let mut feature = SsrFeature::new(SsrHandle::default());
    feature.set_shader_name(&mut device, "Custom/broken_ssr");
    assert!(matches!(
        feature.warm_up(&mut device),
        Err(SsrError::MaterialCreation { .. })
    ));
    assert_eq!(device.material_count(), 0);

    let mut frame = device.begin_frame(camera(), color);
    assert_eq!(
        feature.render_camera(&mut frame),
        CameraOutcome::Skipped(SkipReason::ShaderUnavailable)
    );
    assert!(frame.commands().is_empty());
    frame.finish().unwrap();
    assert_eq!(device.pool().active_count(), 0);
}

#[test]
fn wgpu_missing_frame_inputs_still_releases() {
    let Some((mut device, color)) = setup() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };
    device.clear_frame_inputs();
    let mut feature = SsrFeature::new(SsrHandle::default());

    let mut frame = device.begin_frame(camera(), color);
    assert_eq!(feature.render_camera(&mut frame), CameraOutcome::Rendered);
    assert!(frame.finish().is_err());

    assert_eq!(device.pool().active_count(), 0);
}
