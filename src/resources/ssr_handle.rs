//! Shared SSR Control Handle
//!
//! [`SsrHandle`] replaces a process-wide static feature instance. It is cheap
//! to clone and is threaded explicitly into the pipeline adapter and into any
//! tuning UI that wants to change settings at runtime.
//!
//! # Snapshot semantics
//!
//! Settings are stored as an `Arc<SsrSettings>` behind a `RwLock`. A write
//! builds a fresh clamped value and swaps the `Arc`; it never mutates the
//! value a reader is holding. The adapter takes exactly one snapshot per
//! camera per frame, so a replacement made mid-frame becomes visible on the
//! next camera/frame and never tears.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::ssr::SsrSettings;

#[derive(Debug)]
struct SsrControl {
    settings: RwLock<Arc<SsrSettings>>,
    enabled: AtomicBool,
    version: AtomicU64,
}

/// Cloneable handle to the runtime-replaceable SSR configuration.
#[derive(Debug, Clone)]
pub struct SsrHandle {
    inner: Arc<SsrControl>,
}

impl Default for SsrHandle {
    fn default() -> Self {
        Self::new(SsrSettings::default())
    }
}

impl SsrHandle {
    /// Creates a handle holding a clamped copy of `settings`, enabled.
    #[must_use]
    pub fn new(settings: SsrSettings) -> Self {
        Self {
            inner: Arc::new(SsrControl {
                settings: RwLock::new(Arc::new(settings.clamped())),
                enabled: AtomicBool::new(true),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a copy of the current settings.
    #[must_use]
    pub fn settings(&self) -> SsrSettings {
        **self.inner.settings.read()
    }

    /// Returns the shared snapshot without copying.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SsrSettings> {
        Arc::clone(&self.inner.settings.read())
    }

    /// Clamps `settings` and swaps it in. Takes effect from the next frame.
    pub fn set_settings(&self, settings: SsrSettings) {
        let clamped = Arc::new(settings.clamped());
        *self.inner.settings.write() = clamped;
        self.inner.version.fetch_add(1, Ordering::Release);
    }

    /// Number of settings replacements so far.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Global gate for every camera. Default: `true`.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Enables or disables the stage for all cameras starting with the next frame.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }
}
