//! SSR Feature & Pass Lifecycle Tests
//!
//! Tests for:
//! - SsrFeature::render_camera: gating, outcomes, recorded command sequence
//! - Material lifecycle: lazy compile, caching, warm-up, reload, dispose
//! - SsrPass: state machine transitions and guards
//! - Resource release on every exit path

use glam::{Mat4, Vec4};

use myth_ssr::errors::SsrError;
use myth_ssr::renderer::backends::software::{GBuffer, SoftwareDevice, SoftwareTexture};
use myth_ssr::renderer::feature::{CameraOutcome, SkipReason, SsrFeature};
use myth_ssr::renderer::graph::commands::{KernelPass, MaterialId, RenderCommand, TextureId};
use myth_ssr::renderer::graph::context::{PassInputs, RenderPassEvent};
use myth_ssr::renderer::graph::passes::ssr::{PassState, SsrPass};
use myth_ssr::renderer::pipeline::shader_library::{ShaderLibrary, ShaderProvider};
use myth_ssr::resources::ssr::SsrSettings;
use myth_ssr::resources::ssr_handle::SsrHandle;
use myth_ssr::scene::camera::{CameraData, CameraFrameState};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 16;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

fn camera() -> CameraData {
    let proj = Mat4::perspective_rh(60f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 50.0);
    CameraData::new(WIDTH, HEIGHT, Mat4::IDENTITY, proj)
}

fn setup() -> (SoftwareDevice, TextureId) {
    let mut device = SoftwareDevice::new();
    device.set_gbuffer(GBuffer::background(WIDTH, HEIGHT).unwrap());
    let color = device.import_texture(SoftwareTexture::filled(
        WIDTH,
        HEIGHT,
        FORMAT,
        Vec4::new(0.2, 0.4, 0.6, 1.0),
    ));
    (device, color)
}

/// Renders one camera and returns (outcome, executed commands).
fn run(feature: &mut SsrFeature, device: &mut SoftwareDevice, camera: CameraData, color: TextureId) -> (CameraOutcome, Vec<RenderCommand>) {
    let mut frame = device.begin_frame(camera, color);
    let outcome = feature.render_camera(&mut frame);
    let commands = frame.finish().unwrap();
    (outcome, commands)
}

fn compile_material(device: &mut SoftwareDevice) -> MaterialId {
    let shader = device.find_shader("Hidden/ssr_shader").unwrap();
    device.create_material(&shader).unwrap()
}

fn count(commands: &[RenderCommand], pred: impl Fn(&RenderCommand) -> bool) -> usize {
    commands.iter().filter(|c| pred(c)).count()
}

fn draws(commands: &[RenderCommand]) -> usize {
    count(commands, |c| matches!(c, RenderCommand::DrawPass { .. }))
}

fn allocations(commands: &[RenderCommand]) -> usize {
    count(commands, |c| matches!(c, RenderCommand::AllocateTarget { .. }))
}

fn releases(commands: &[RenderCommand]) -> usize {
    count(commands, |c| matches!(c, RenderCommand::ReleaseTarget { .. }))
}

// ============================================================================
// Recorded sequence
// ============================================================================

#[test]
fn injection_point_is_after_transparents() {
    assert_eq!(SsrFeature::INJECTION_POINT, RenderPassEvent::AfterRenderingTransparents);
}

#[test]
fn rendered_camera_records_full_sequence() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    let (outcome, cmds) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Rendered);
    assert_eq!(cmds.len(), 9);

    let RenderCommand::AllocateTarget { id: reflection, .. } = cmds[0] else {
        panic!("expected reflection map allocation, got {:?}", cmds[0]);
    };
    let RenderCommand::AllocateTarget { id: copy, .. } = cmds[1] else {
        panic!("expected scene copy allocation, got {:?}", cmds[1]);
    };
    let reflection = TextureId::Transient(reflection);
    let copy = TextureId::Transient(copy);

    assert_eq!(
        cmds[2],
        RenderCommand::Blit {
            source: color,
            destination: copy
        }
    );
    assert!(matches!(cmds[3], RenderCommand::UploadUniforms { .. }));
    assert!(matches!(
        cmds[4],
        RenderCommand::DrawPass {
            pass: KernelPass::Trace,
            overlay: None,
            ..
        }
    ));
    if let RenderCommand::DrawPass { pass, source, destination, .. } = &cmds[4] {
        assert_eq!(pass.index(), 0);
        assert_eq!(*source, color);
        assert_eq!(*destination, reflection);
    }
    assert_eq!(
        cmds[5],
        RenderCommand::Blit {
            source: color,
            destination: copy
        }
    );
    if let RenderCommand::DrawPass {
        pass,
        source,
        overlay,
        destination,
        ..
    } = &cmds[6]
    {
        assert_eq!(*pass, KernelPass::Compose);
        assert_eq!(pass.index(), 1);
        assert_eq!(*source, copy);
        assert_eq!(*overlay, Some(reflection));
        assert_eq!(*destination, color);
    } else {
        panic!("expected compose draw, got {:?}", cmds[6]);
    }
    assert_eq!(releases(&cmds[7..]), 2);
    assert_eq!(device.live_targets(), 0);
}

#[test]
fn stage_requests_all_frame_inputs() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    let mut frame = device.begin_frame(camera(), color);
    feature.render_camera(&mut frame);
    assert_eq!(frame.requested_inputs(), PassInputs::all());
    frame.finish().unwrap();
}

#[test]
fn resnapshot_can_be_disabled() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());
    feature.pass_mut().set_resnapshot_before_compose(false);

    let (outcome, cmds) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Rendered);
    assert_eq!(count(&cmds, |c| matches!(c, RenderCommand::Blit { .. })), 1);
}

#[test]
fn uniforms_uploaded_once_with_camera_state() {
    let (mut device, color) = setup();
    let settings = SsrSettings {
        step_stride: 0.07,
        max_steps: 40.0,
        downsample: 1,
        min_smoothness: 0.6,
    };
    let mut feature = SsrFeature::new(SsrHandle::new(settings));
    let cam = camera().with_render_scale(0.5);

    let (_, cmds) = run(&mut feature, &mut device, cam.clone(), color);
    assert_eq!(count(&cmds, |c| matches!(c, RenderCommand::UploadUniforms { .. })), 1);

    let material = feature.material().unwrap();
    let u = device.material_uniforms(material).unwrap();
    let state = CameraFrameState::from_camera(&cam);
    assert_eq!(u.inverse_projection_matrix, state.inverse_projection_matrix);
    assert_eq!(u.inverse_view_matrix, state.inverse_view_matrix);
    assert_eq!(u.render_scale, 0.5);
    assert_eq!(u.stride, 0.07);
    assert_eq!(u.num_steps, 40.0);
    assert_eq!(u.min_smoothness, 0.6);
    // 32×16 at scale 0.5 → 16×8 → half resolution 8×4.
    assert_eq!(u.working_size.to_array(), [8.0, 4.0]);
}

#[test]
fn multiple_cameras_run_independently() {
    let (mut device, color) = setup();
    let second = device.import_texture(SoftwareTexture::new(8, 8, FORMAT));
    let mut feature = SsrFeature::new(SsrHandle::default());

    let (a, cmds_a) = run(&mut feature, &mut device, camera(), color);
    let small = CameraData::new(8, 8, Mat4::IDENTITY, Mat4::IDENTITY);
    let (b, cmds_b) = run(&mut feature, &mut device, small, second);

    assert_eq!((a, b), (CameraOutcome::Rendered, CameraOutcome::Rendered));
    assert_eq!(allocations(&cmds_a) + allocations(&cmds_b), 4);
    assert_eq!(device.live_targets(), 0);
    assert_eq!(feature.pass().resources().outstanding_allocations(), 0);
    assert_eq!(device.stats().peak_live_targets, 2);
}

#[test]
fn settings_change_applies_from_next_camera() {
    let (mut device, color) = setup();
    let handle = SsrHandle::default();
    let mut feature = SsrFeature::new(handle.clone());

    let (_, first) = run(&mut feature, &mut device, camera(), color);
    handle.set_settings(SsrSettings {
        downsample: 1,
        ..Default::default()
    });
    let (_, second) = run(&mut feature, &mut device, camera(), color);

    let reflection_size = |cmds: &[RenderCommand]| match &cmds[0] {
        RenderCommand::AllocateTarget { desc, .. } => (desc.width, desc.height),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(reflection_size(&first), (WIDTH, HEIGHT));
    assert_eq!(reflection_size(&second), (WIDTH / 2, HEIGHT / 2));
}

// ============================================================================
// Gating
// ============================================================================

#[test]
fn disabling_mid_session_skips_next_frame() {
    let (mut device, color) = setup();
    let handle = SsrHandle::default();
    let mut feature = SsrFeature::new(handle.clone());

    let (first, _) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(first, CameraOutcome::Rendered);

    let baseline = device.texture(color).unwrap().clone();
    handle.set_enabled(false);

    let (second, cmds) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(second, CameraOutcome::Skipped(SkipReason::FeatureDisabled));
    assert!(cmds.is_empty());
    assert_eq!(draws(&cmds), 0);
    assert_eq!(device.texture(color).unwrap(), &baseline);
}

#[test]
fn camera_without_post_processing_is_skipped() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    let (outcome, cmds) = run(&mut feature, &mut device, camera().with_post_processing(false), color);
    assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::PostProcessingDisabled));
    assert!(cmds.is_empty());
    assert!(feature.material().is_none(), "no material compiled for skipped cameras");
}

#[test]
fn missing_shader_skips_without_allocating() {
    let mut device = SoftwareDevice::with_library(ShaderLibrary::empty());
    let color = device.import_texture(SoftwareTexture::new(WIDTH, HEIGHT, FORMAT));
    let mut feature = SsrFeature::new(SsrHandle::default());

    for _ in 0..3 {
        let (outcome, cmds) = run(&mut feature, &mut device, camera(), color);
        assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::ShaderUnavailable));
        assert_eq!(allocations(&cmds), 0);
        assert!(cmds.is_empty());
    }
    assert_eq!(device.stats().allocations, 0);
}

#[test]
fn invalid_shader_source_skips_without_allocating() {
    let mut library = ShaderLibrary::empty();
    library.register("Custom/broken", "fn vs_main() {}");
    let mut device = SoftwareDevice::with_library(library);
    let color = device.import_texture(SoftwareTexture::new(WIDTH, HEIGHT, FORMAT));

    let mut feature = SsrFeature::new(SsrHandle::default());
    feature.set_shader_name(&mut device, "Custom/broken");

    let (outcome, cmds) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::ShaderUnavailable));
    assert!(cmds.is_empty());
}

#[test]
fn zero_sized_color_target_is_skipped() {
    let mut device = SoftwareDevice::new();
    let color = device.import_texture(SoftwareTexture::new(0, 0, FORMAT));
    let mut feature = SsrFeature::new(SsrHandle::default());

    let (outcome, cmds) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::DegenerateTarget));
    assert_eq!(allocations(&cmds), 0);
    assert_eq!(draws(&cmds), 0);
    assert_eq!(feature.pass().state(), PassState::Skipped);
}

#[test]
fn zero_sized_camera_viewport_is_skipped() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());
    let cam = CameraData::new(0, 0, Mat4::IDENTITY, Mat4::IDENTITY);

    let (outcome, cmds) = run(&mut feature, &mut device, cam, color);
    assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::DegenerateTarget));
    assert!(cmds.is_empty());
}

// ============================================================================
// Abort & cleanup
// ============================================================================

#[test]
fn host_abort_after_configure_still_releases() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    let mut frame = device.begin_frame(camera(), color);
    frame.abort();
    let outcome = feature.render_camera(&mut frame);
    let cmds = frame.finish().unwrap();

    assert_eq!(outcome, CameraOutcome::Aborted);
    assert_eq!(draws(&cmds), 0);
    assert_eq!(allocations(&cmds), 2);
    assert_eq!(releases(&cmds), 2);
    assert_eq!(device.live_targets(), 0);
    assert_eq!(feature.pass().state(), PassState::CleanedUp);
}

#[test]
fn many_frames_leave_no_outstanding_targets() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    for i in 0..20 {
        let mut frame = device.begin_frame(camera(), color);
        if i % 3 == 0 {
            frame.abort();
        }
        feature.render_camera(&mut frame);
        frame.finish().unwrap();
    }

    let stats = device.stats();
    assert_eq!(stats.allocations, 40);
    assert_eq!(stats.releases, 40);
    assert_eq!(device.live_targets(), 0);
    assert_eq!(feature.pass().resources().outstanding_allocations(), 0);
}

// ============================================================================
// Material lifecycle
// ============================================================================

#[test]
fn material_compiled_once_and_cached() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    for _ in 0..4 {
        run(&mut feature, &mut device, camera(), color);
    }
    assert_eq!(device.stats().materials_created, 1);
    assert_eq!(device.material_shader(feature.material().unwrap()), Some("Hidden/ssr_shader"));
}

#[test]
fn settings_replacement_keeps_material() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    run(&mut feature, &mut device, camera(), color);
    let before = feature.material();
    feature.set_settings(SsrSettings {
        step_stride: 0.1,
        ..Default::default()
    });
    run(&mut feature, &mut device, camera(), color);

    assert_eq!(feature.material(), before);
    assert_eq!(device.stats().materials_created, 1);
}

#[test]
fn unregistered_shader_skips_after_reload() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());
    let (outcome, _) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Rendered);

    assert!(device.library_mut().unregister("Hidden/ssr_shader"));
    assert!(!device.library_mut().unregister("Hidden/ssr_shader"));

    // The cached material keeps working until it is dropped.
    let (outcome, _) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Rendered);

    feature.reload_material(&mut device);
    let (outcome, cmds) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::ShaderUnavailable));
    assert!(cmds.is_empty());
    assert_eq!(device.material_count(), 0);
}

#[test]
fn warm_up_compiles_eagerly() {
    let mut device = SoftwareDevice::new();
    let feature = SsrFeature::with_warm_up(SsrHandle::default(), &mut device);
    assert!(feature.material().is_some());
    assert_eq!(device.material_count(), 1);
}

#[test]
fn failed_warm_up_is_not_fatal() {
    let mut device = SoftwareDevice::with_library(ShaderLibrary::empty());
    let mut feature = SsrFeature::with_warm_up(SsrHandle::default(), &mut device);
    assert!(feature.material().is_none());

    // Registering the shader later lets lazy compilation succeed.
    device
        .library_mut()
        .register("Hidden/ssr_shader", ShaderLibrary::new().find("Hidden/ssr_shader").unwrap().source().to_owned());
    device.set_gbuffer(GBuffer::background(WIDTH, HEIGHT).unwrap());
    let color = device.import_texture(SoftwareTexture::new(WIDTH, HEIGHT, FORMAT));

    let (outcome, _) = run(&mut feature, &mut device, camera(), color);
    assert_eq!(outcome, CameraOutcome::Rendered);
}

#[test]
fn reload_material_recompiles_on_next_camera() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    run(&mut feature, &mut device, camera(), color);
    feature.reload_material(&mut device);
    assert!(feature.material().is_none());
    assert_eq!(device.stats().materials_destroyed, 1);

    run(&mut feature, &mut device, camera(), color);
    assert_eq!(device.stats().materials_created, 2);
    assert_eq!(device.material_count(), 1);
}

#[test]
fn dispose_destroys_material() {
    let (mut device, color) = setup();
    let mut feature = SsrFeature::new(SsrHandle::default());

    run(&mut feature, &mut device, camera(), color);
    feature.dispose(&mut device);

    assert!(feature.material().is_none());
    assert_eq!(device.material_count(), 0);
}

#[test]
fn ensure_material_reports_missing_shader() {
    let mut device = SoftwareDevice::with_library(ShaderLibrary::empty());
    let mut feature = SsrFeature::new(SsrHandle::default());

    let err = feature.ensure_material(&mut device).unwrap_err();
    assert!(matches!(err, SsrError::ShaderNotFound(name) if name == "Hidden/ssr_shader"));
    assert!(device.find_shader("Hidden/ssr_shader").is_none());
}

// ============================================================================
// SsrPass state machine
// ============================================================================

#[test]
fn pass_starts_idle() {
    assert_eq!(SsrPass::new().state(), PassState::Idle);
}

#[test]
fn pass_execute_before_configure_is_rejected() {
    let (mut device, color) = setup();
    let mut pass = SsrPass::new();
    let mut frame = device.begin_frame(camera(), color);

    let err = pass.execute(&mut frame).unwrap_err();
    assert!(matches!(
        err,
        SsrError::InvalidPassState {
            expected: "Configured",
            found: "Idle"
        }
    ));
    assert!(frame.commands().is_empty());
}

#[test]
fn pass_walks_configured_executed_cleaned_up() {
    let (mut device, color) = setup();
    let material = compile_material(&mut device);
    let settings = SsrSettings::default();
    let state = CameraFrameState::from_camera(&camera());

    let mut pass = SsrPass::new();
    let mut frame = device.begin_frame(camera(), color);

    assert!(pass.configure(&mut frame, material, &state, &settings).unwrap());
    assert_eq!(pass.state(), PassState::Configured);
    assert!(pass.targets().is_some());

    // A second configure without cleanup would leak the first targets.
    assert!(pass.configure(&mut frame, material, &state, &settings).is_err());

    pass.execute(&mut frame).unwrap();
    assert_eq!(pass.state(), PassState::Executed);
    assert!(pass.execute(&mut frame).is_err());

    pass.cleanup(&mut frame);
    assert_eq!(pass.state(), PassState::CleanedUp);
    assert!(pass.targets().is_none());

    // Cleanup is idempotent.
    pass.cleanup(&mut frame);
    assert_eq!(frame.commands().release_count(), 2);

    // And the next camera can start over.
    assert!(pass.configure(&mut frame, material, &state, &settings).unwrap());
    pass.cleanup(&mut frame);
    frame.finish().unwrap();
    assert_eq!(device.live_targets(), 0);
}

#[test]
fn pass_cleanup_without_execute_releases() {
    let (mut device, color) = setup();
    let material = compile_material(&mut device);
    let mut pass = SsrPass::new();
    let mut frame = device.begin_frame(camera(), color);

    pass.configure(
        &mut frame,
        material,
        &CameraFrameState::from_camera(&camera()),
        &SsrSettings::default(),
    )
    .unwrap();
    pass.cleanup(&mut frame);

    assert_eq!(frame.commands().draw_count(), 0);
    assert_eq!(frame.commands().allocation_count(), 2);
    assert_eq!(frame.commands().release_count(), 2);
    frame.finish().unwrap();
}
