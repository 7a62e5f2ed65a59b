pub mod shader_library;

pub use shader_library::{SSR_SHADER_NAME, ShaderHandle, ShaderLibrary, ShaderProvider};
