//! Command buffer executors.
//!
//! | Backend           | Use                                   |
//! |-------------------|---------------------------------------|
//! | [`software`]      | CPU reference, tests, headless tools  |
//! | [`wgpu_device`]   | GPU execution on a `wgpu::Device`     |

pub mod mipmap;
pub mod software;
pub mod software_kernel;
pub mod transient_pool;
pub mod wgpu_device;

pub use software::{DeviceStats, GBuffer, SoftwareDevice, SoftwareFrame, SoftwareTexture};
pub use wgpu_device::{FrameInputViews, WgpuDevice, WgpuFrame};
