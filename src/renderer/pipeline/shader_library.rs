//! Named Shader Lookup
//!
//! The SSR stage resolves its GPU program by name exactly once per material
//! lifetime. [`ShaderLibrary`] maps names to WGSL sources; a
//! [`ShaderProvider`] (one per backend) turns a resolved [`ShaderHandle`] into
//! a [`MaterialId`] it owns.
//!
//! The built-in program is registered under [`SSR_SHADER_NAME`].

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::errors::{Result, SsrError};
use crate::renderer::graph::commands::MaterialId;

/// Name of the built-in SSR program.
pub const SSR_SHADER_NAME: &str = "Hidden/ssr_shader";

/// Entry points every SSR program must export.
pub const VERTEX_ENTRY: &str = "vs_main";
pub const TRACE_ENTRY: &str = "fs_trace";
pub const COMPOSE_ENTRY: &str = "fs_compose";

const BUILTIN_SSR_SOURCE: &str = include_str!("shaders/ssr.wgsl");

/// A resolved shader: its registered name and WGSL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderHandle {
    name: String,
    source: Cow<'static, str>,
}

impl ShaderHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the source declares `fn <entry>(`.
    #[must_use]
    pub fn has_entry_point(&self, entry: &str) -> bool {
        self.source
            .match_indices(entry)
            .any(|(at, _)| {
                let before = self.source[..at].trim_end();
                let after = self.source[at + entry.len()..].trim_start();
                before.ends_with("fn") && after.starts_with('(')
            })
    }

    /// Checks that the trace and compose programs and their vertex stage exist.
    pub fn validate_entry_points(&self) -> Result<()> {
        for entry in [VERTEX_ENTRY, TRACE_ENTRY, COMPOSE_ENTRY] {
            if !self.has_entry_point(entry) {
                return Err(SsrError::MaterialCreation {
                    shader: self.name.clone(),
                    reason: format!("missing entry point `{entry}`"),
                });
            }
        }
        Ok(())
    }
}

/// Name → WGSL source registry.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    shaders: FxHashMap<String, Cow<'static, str>>,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderLibrary {
    /// Library containing the built-in SSR program.
    #[must_use]
    pub fn new() -> Self {
        let mut library = Self::empty();
        library.register(SSR_SHADER_NAME, Cow::Borrowed(BUILTIN_SSR_SOURCE));
        library
    }

    /// Library with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            shaders: FxHashMap::default(),
        }
    }

    /// Registers (or replaces) a shader under `name`.
    pub fn register(&mut self, name: impl Into<String>, source: impl Into<Cow<'static, str>>) {
        let name = name.into();
        log::debug!("Registering shader `{name}`");
        self.shaders.insert(name, source.into());
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.shaders.remove(name).is_some()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<ShaderHandle> {
        self.shaders.get(name).map(|source| ShaderHandle {
            name: name.to_owned(),
            source: source.clone(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

/// Backend-side shader lookup and material factory.
pub trait ShaderProvider {
    /// Resolves a shader by name.
    fn find_shader(&self, name: &str) -> Option<ShaderHandle>;

    /// Compiles a material from a resolved shader.
    fn create_material(&mut self, shader: &ShaderHandle) -> Result<MaterialId>;

    /// Destroys a material. Unknown ids are ignored.
    fn destroy_material(&mut self, material: MaterialId);
}
