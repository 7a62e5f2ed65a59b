pub mod camera;

pub use camera::{CameraData, CameraFrameState, CameraKind};
