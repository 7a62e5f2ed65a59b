//! SSR Diagnostics Tests
//!
//! Verifies the `log` records emitted by the stage: one error per camera when
//! the shader is unavailable, and nothing above `debug` on the happy path.
//!
//! A process-wide logger can only be installed once, so everything lives in
//! a single test.

use glam::Mat4;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use myth_ssr::renderer::backends::software::{GBuffer, SoftwareDevice, SoftwareTexture};
use myth_ssr::renderer::feature::{CameraOutcome, SkipReason, SsrFeature};
use myth_ssr::renderer::pipeline::shader_library::ShaderLibrary;
use myth_ssr::resources::ssr_handle::SsrHandle;
use myth_ssr::scene::camera::CameraData;

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl CaptureLogger {
    fn take(&self) -> Vec<(Level, String)> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("myth_ssr")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};

fn at_level(records: &[(Level, String)], level: Level) -> usize {
    records.iter().filter(|(l, _)| *l == level).count()
}

#[test]
fn stage_log_records() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let camera = CameraData::new(16, 16, Mat4::IDENTITY, Mat4::IDENTITY);

    // --- Missing shader: one error per camera per frame ---
    {
        let mut device = SoftwareDevice::with_library(ShaderLibrary::empty());
        let color_a = device.import_texture(SoftwareTexture::new(16, 16, wgpu::TextureFormat::Rgba16Float));
        let color_b = device.import_texture(SoftwareTexture::new(16, 16, wgpu::TextureFormat::Rgba16Float));
        let mut feature = SsrFeature::new(SsrHandle::default());
        LOGGER.take();

        for _frame in 0..2 {
            for color in [color_a, color_b] {
                let mut frame = device.begin_frame(camera.clone(), color);
                let outcome = feature.render_camera(&mut frame);
                frame.finish().unwrap();
                assert_eq!(outcome, CameraOutcome::Skipped(SkipReason::ShaderUnavailable));
            }
        }

        let records = LOGGER.take();
        assert_eq!(at_level(&records, Level::Error), 4, "records: {records:?}");
        assert!(
            records
                .iter()
                .filter(|(l, _)| *l == Level::Error)
                .all(|(_, msg)| msg.contains("Hidden/ssr_shader")),
            "error names the missing shader: {records:?}"
        );
    }

    // --- Happy path: no warnings or errors ---
    {
        let mut device = SoftwareDevice::new();
        device.set_gbuffer(GBuffer::background(16, 16).unwrap());
        let color = device.import_texture(SoftwareTexture::new(16, 16, wgpu::TextureFormat::Rgba16Float));
        let mut feature = SsrFeature::new(SsrHandle::default());
        LOGGER.take();

        for _ in 0..3 {
            let mut frame = device.begin_frame(camera.clone(), color);
            assert!(feature.render_camera(&mut frame).is_rendered());
            frame.finish().unwrap();
        }

        let records = LOGGER.take();
        assert_eq!(at_level(&records, Level::Error), 0, "records: {records:?}");
        assert_eq!(at_level(&records, Level::Warn), 0, "records: {records:?}");
        assert_eq!(at_level(&records, Level::Debug), 1, "material compiled once: {records:?}");
    }

    // --- Host abort: one warning, targets still released ---
    {
        let mut device = SoftwareDevice::new();
        device.set_gbuffer(GBuffer::background(16, 16).unwrap());
        let color = device.import_texture(SoftwareTexture::new(16, 16, wgpu::TextureFormat::Rgba16Float));
        let mut feature = SsrFeature::new(SsrHandle::default());
        LOGGER.take();

        let mut frame = device.begin_frame(camera.clone(), color);
        frame.abort();
        assert_eq!(feature.render_camera(&mut frame), CameraOutcome::Aborted);
        frame.finish().unwrap();

        let records = LOGGER.take();
        assert_eq!(at_level(&records, Level::Warn), 1, "records: {records:?}");
        assert_eq!(at_level(&records, Level::Error), 0, "records: {records:?}");
        assert_eq!(device.live_targets(), 0);
    }
}
