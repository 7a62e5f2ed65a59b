//! Error Types
//!
//! This module defines the error types used throughout the SSR stage.
//!
//! # Overview
//!
//! The main error type [`SsrError`] covers the failure modes of the stage:
//! - Shader lookup and material compilation failures
//! - Render pass lifecycle violations
//! - Unknown texture / material handles reaching a backend
//! - Missing or malformed per-frame inputs (depth / normal / motion)
//! - Configuration parsing and file I/O errors
//!
//! None of these are fatal to the host. The pipeline adapter
//! ([`SsrFeature`](crate::renderer::feature::SsrFeature)) turns every error into
//! "no reflections this frame" and still releases its render targets.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, SsrError>`.
//!
//! ```rust,ignore
//! use myth_ssr::errors::{SsrError, Result};
//!
//! fn load_settings(json: &str) -> Result<SsrSettings> {
//!     SsrSettings::from_json(json)
//! }
//! ```

use thiserror::Error;

use crate::renderer::graph::commands::{MaterialId, TextureId};

/// The main error type for the SSR stage.
#[derive(Error, Debug)]
pub enum SsrError {
    // ========================================================================
    // Shader & Material Errors
    // ========================================================================
    /// The named shader could not be resolved by the shader provider.
    #[error("Shader not found: {0}")]
    ShaderNotFound(String),

    /// The shader was found but a material could not be built from it.
    #[error("Failed to create material from shader `{shader}`: {reason}")]
    MaterialCreation {
        /// Name of the shader that failed
        shader: String,
        /// Backend-provided reason
        reason: String,
    },

    /// A command referenced a material that the backend does not own.
    #[error("Unknown material: {0:?}")]
    UnknownMaterial(MaterialId),

    // ========================================================================
    // Pass Lifecycle Errors
    // ========================================================================
    /// A lifecycle step was invoked from the wrong state.
    #[error("Invalid SSR pass state: expected {expected}, found {found}")]
    InvalidPassState {
        /// The state the step requires
        expected: &'static str,
        /// The state the pass was actually in
        found: &'static str,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A command referenced a texture that is not allocated or imported.
    #[error("Unknown texture: {0:?}")]
    UnknownTexture(TextureId),

    /// A draw was recorded but the host never supplied depth / normal / motion.
    #[error("Frame inputs (depth, normal, motion) were not provided")]
    MissingFrameInputs,

    /// The supplied frame inputs are malformed (size mismatch, etc.).
    #[error("Invalid frame inputs: {0}")]
    InvalidFrameInputs(String),

    /// The backend cannot perform the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings document could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Reading a settings file failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Alias for `Result<T, SsrError>`.
pub type Result<T> = std::result::Result<T, SsrError>;
