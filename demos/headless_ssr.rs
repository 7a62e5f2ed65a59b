//! Headless Screen-Space Reflections Example
//!
//! Renders a tiny synthetic scene through the SSR stage on the CPU backend
//! and prints the reflected image as ASCII.
//!
//! The left half of the screen is a 45° mirror, the right half a matte red
//! wall in front of it. Mirror pixels pick up the wall's color.
//!
//! Run with `RUST_LOG=debug` to see the stage's log output.
//!
//! Optional first argument: path to a JSON settings file, e.g.
//! `{ "downsample": 1, "step_stride": 0.02 }`.

use glam::{Mat4, Vec3, Vec4};

use myth_ssr::{CameraData, GBuffer, SoftwareDevice, SoftwareTexture, SsrFeature, SsrHandle, SsrSettings, TextureId};

const SIZE: u32 = 24;

fn projection() -> Mat4 {
    Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0)
}

fn ndc_depth(view_z: f32) -> f32 {
    let clip = projection() * Vec4::new(0.0, 0.0, view_z, 1.0);
    clip.z / clip.w
}

fn build_scene(device: &mut SoftwareDevice) -> myth_ssr::Result<TextureId> {
    let mirror = Vec3::new(1.0, 0.0, 1.0).normalize();
    let mut gbuffer = GBuffer::background(SIZE, SIZE)?;
    let mut color = SoftwareTexture::new(SIZE, SIZE, wgpu::TextureFormat::Rgba16Float);

    for y in 0..SIZE {
        for x in 0..SIZE {
            if x < SIZE / 2 {
                gbuffer.set(x, y, ndc_depth(-5.0), mirror, 1.0);
                color.set_texel(x, y, Vec4::new(0.0, 0.0, 0.6, 1.0));
            } else {
                gbuffer.set(x, y, ndc_depth(-4.95), Vec3::Z, 0.0);
                color.set_texel(x, y, Vec4::new(1.0, 0.0, 0.0, 1.0));
            }
        }
    }

    device.set_gbuffer(gbuffer);
    Ok(device.import_texture(color))
}

fn shade(texel: Vec4) -> char {
    const RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
    let index = (texel.x.clamp(0.0, 1.0) * (RAMP.len() - 1) as f32).round() as usize;
    RAMP[index]
}

fn load_settings() -> myth_ssr::Result<SsrSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            SsrSettings::from_json(&json)
        }
        None => Ok(SsrSettings::default()),
    }
}

fn main() -> myth_ssr::Result<()> {
    env_logger::init();

    let settings = load_settings()?;
    log::info!("SSR settings: {settings:?}");

    let mut device = SoftwareDevice::new();
    let color = build_scene(&mut device)?;
    let camera = CameraData::new(SIZE, SIZE, Mat4::IDENTITY, projection());

    let handle = SsrHandle::new(settings);
    let mut feature = SsrFeature::with_warm_up(handle.clone(), &mut device);

    let mut frame = device.begin_frame(camera.clone(), color);
    let outcome = feature.render_camera(&mut frame);
    let commands = frame.finish()?;
    log::info!("Frame 1: {outcome:?}, {} commands", commands.len());

    if let Some(image) = device.texture(color) {
        println!("Red channel after SSR:");
        for y in 0..image.height() {
            let row: String = (0..image.width()).map(|x| shade(image.texel(x, y))).collect();
            println!("  |{row}|");
        }
    }

    // Disabling takes effect on the next camera.
    handle.set_enabled(false);
    let mut frame = device.begin_frame(camera, color);
    let outcome = feature.render_camera(&mut frame);
    frame.finish()?;
    log::info!("Frame 2: {outcome:?}");

    feature.dispose(&mut device);
    log::info!("Stats: {:?}", device.stats());
    Ok(())
}
