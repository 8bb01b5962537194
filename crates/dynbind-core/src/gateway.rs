//! Native loader gateway.
//!
//! Thin translation over the operating system's dynamic loading primitives.
//! [`SystemLoader`] is the real implementation; the [`NativeLoader`] trait lets
//! the lifecycle run against any other loader.

use std::{ffi::c_void, path::Path, ptr::NonNull};

use libloading::Library;
use tracing::{debug, warn};

/// An OS-level load call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load native library {path}: {reason}")]
pub struct LoadFailure {
    /// Path or identifier that was passed to the loader.
    pub path: String,
    /// Diagnostic text reported by the operating system.
    pub reason: String,
}

impl LoadFailure {
    #[must_use]
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Load, unload and symbol lookup for native images.
pub trait NativeLoader {
    /// Live reference to a loaded image.
    type Handle;

    /// Loads the image at `path`, which may also be a bare identifier the OS
    /// loader resolves on its own.
    ///
    /// # Errors
    ///
    /// Returns [`LoadFailure`] carrying the OS diagnostic. No handle is
    /// produced on failure.
    fn load(&self, path: &Path) -> Result<Self::Handle, LoadFailure>;

    /// Releases a handle. Consuming it makes a second release unrepresentable.
    fn unload(&self, handle: Self::Handle);

    /// Looks up an exported symbol. A missing symbol is `None`, not an error.
    fn resolve_symbol(&self, handle: &Self::Handle, name: &str) -> Option<NonNull<c_void>>;
}

/// Loader backed by the platform dynamic linker.
///
/// Loading an image runs its initialization routines; only load images you
/// trust.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLoader;

impl NativeLoader for SystemLoader {
    type Handle = Library;

    fn load(&self, path: &Path) -> Result<Library, LoadFailure> {
        debug!(path = %path.display(), "Opening native image");
        // SAFETY: initializers of the image run here; the caller chose the image.
        unsafe { Library::new(path) }.map_err(|e| LoadFailure::new(path, e.to_string()))
    }

    fn unload(&self, handle: Library) {
        if let Err(e) = handle.close() {
            warn!(error = %e, "Native image reported an error while closing");
        }
    }

    fn resolve_symbol(&self, handle: &Library, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is read as an opaque address and never dereferenced here.
        let symbol = unsafe { handle.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}
