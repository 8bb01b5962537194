//! Native library handle lifecycle.
//!
//! [`NativeLibrary`] owns the raw handle of one loaded image and the binding
//! table built from it. It moves between two states:
//!
//! - **Unloaded**: no handle, empty table.
//! - **Loaded**: live handle, table populated from the catalogue.
//!
//! Loading over a loaded instance replaces the image. Every release path
//! ([`NativeLibrary::free_library`], [`NativeLibrary::dispose`], the implicit
//! release of a reload, and `Drop`) goes through one primitive that takes the
//! handle out of the instance before handing it to the loader, so an image is
//! unloaded at most once.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use dynbind_abi::{
    AnnotatedSymbols, Bound, BoundFunction, FunctionCatalogue, NativeSignature, SymbolNameResolver,
};
use tracing::{debug, info, warn};

use crate::{
    config::LibraryConfig,
    diagnostics::{BindingDiagnostics, TracingDiagnostics},
    gateway::{LoadFailure, NativeLoader, SystemLoader},
    naming::{PlatformNaming, host_platform},
    table::SymbolTable,
};

/// Errors reported by [`NativeLibrary`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BinderError {
    /// The OS loader could not load the image.
    #[error("error loading native library from path: {path}: {reason}")]
    LoadFailure { path: String, reason: String },

    /// The instance was disposed; it can no longer load images.
    #[error("native library binder has already been released")]
    Disposed,

    /// No function is bound under the requested name.
    #[error("function not bound: {0}")]
    FunctionNotBound(String),

    /// The function is bound with a different calling shape.
    #[error("function {name} is bound as {actual}, not {expected}")]
    SignatureMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl From<LoadFailure> for BinderError {
    fn from(failure: LoadFailure) -> Self {
        Self::LoadFailure {
            path: failure.path,
            reason: failure.reason,
        }
    }
}

/// Binds a fixed catalogue of exported functions from a native library.
///
/// # Example
///
/// ```no_run
/// use dynbind_abi::function_catalogue;
/// use dynbind_core::NativeLibrary;
///
/// function_catalogue! {
///     static ASSIMP = unsafe {
///         IsExtensionSupported => "aiIsExtensionSupported":
///             unsafe extern "C" fn(*const std::ffi::c_char) -> i32,
///     };
/// }
///
/// # fn main() -> Result<(), dynbind_core::BinderError> {
/// let mut assimp = NativeLibrary::new("assimp", ASSIMP);
/// assimp.set_throw_on_load_failure(false);
///
/// if assimp.load_library(None)? {
///     println!("bound: {:?}", assimp.bound_functions());
/// }
/// # Ok(())
/// # }
/// ```
pub struct NativeLibrary<L: NativeLoader = SystemLoader> {
    logical_name: String,
    default_library_name: String,
    configured_path: Option<PathBuf>,
    catalogue: FunctionCatalogue,
    resolver: Box<dyn SymbolNameResolver + Send + Sync>,
    diagnostics: Box<dyn BindingDiagnostics>,
    loader: L,
    handle: Option<L::Handle>,
    loaded_path: Option<PathBuf>,
    table: SymbolTable,
    throw_on_load_failure: bool,
    disposed: bool,
}

impl NativeLibrary<SystemLoader> {
    /// Creates an unloaded binder for `default_logical_name` using the host
    /// platform's naming, the system loader and symbol annotations.
    #[must_use]
    pub fn new(default_logical_name: impl Into<String>, catalogue: FunctionCatalogue) -> Self {
        NativeLibraryBuilder::new(default_logical_name, catalogue).build()
    }

    /// Starts a builder for a binder with non-default collaborators.
    pub fn builder(
        default_logical_name: impl Into<String>,
        catalogue: FunctionCatalogue,
    ) -> NativeLibraryBuilder<SystemLoader> {
        NativeLibraryBuilder::new(default_logical_name, catalogue)
    }
}

impl<L: NativeLoader> NativeLibrary<L> {
    /// Loads an image and binds the catalogue against it.
    ///
    /// Any image already loaded is released first and its bindings are
    /// dropped. With `path` absent, the configured path is used, falling back
    /// to [`default_library_name`](Self::default_library_name).
    ///
    /// Returns `Ok(true)` once the image is loaded and the table populated.
    /// When the load fails and [`throw_on_load_failure`](Self::throw_on_load_failure)
    /// is off, returns `Ok(false)` and the instance stays unloaded.
    ///
    /// # Errors
    ///
    /// - [`BinderError::Disposed`] if the instance was disposed.
    /// - [`BinderError::LoadFailure`] if the load fails while
    ///   throw-on-load-failure is set.
    pub fn load_library(&mut self, path: Option<&Path>) -> Result<bool, BinderError> {
        if self.disposed {
            return Err(BinderError::Disposed);
        }

        self.release();

        let path = path.map_or_else(|| self.default_path(), Path::to_path_buf);
        info!(
            library = %self.logical_name,
            path = %path.display(),
            "Loading native library"
        );

        let loaded = if path.as_os_str().is_empty() {
            Err(LoadFailure::new(&path, "library path is empty"))
        } else {
            self.loader.load(&path)
        };

        let handle = match loaded {
            Ok(handle) => handle,
            Err(failure) => return self.load_failed(failure),
        };

        let report = self.table.populate(
            &self.catalogue,
            &*self.resolver,
            &self.loader,
            &handle,
            &*self.diagnostics,
        );
        self.handle = Some(handle);

        info!(
            library = %self.logical_name,
            path = %path.display(),
            bound = report.bound,
            skipped = report.skipped,
            duplicates = report.duplicates,
            "Native library loaded"
        );
        self.loaded_path = Some(path);
        Ok(true)
    }

    /// Releases the loaded image and clears the binding table.
    ///
    /// Returns `false` without doing anything when nothing is loaded. The
    /// instance can be loaded again afterwards.
    pub fn free_library(&mut self) -> bool {
        self.release()
    }

    /// Releases the image, if any, and retires the instance.
    ///
    /// Later [`load_library`](Self::load_library) calls fail with
    /// [`BinderError::Disposed`]. Calling `dispose` again is a no-op that
    /// returns `false`.
    pub fn dispose(&mut self) -> bool {
        let released = self.release();
        if !self.disposed {
            debug!(library = %self.logical_name, "Native library binder disposed");
            self.disposed = true;
        }
        released
    }

    /// Returns the bound function `name` as `F`.
    ///
    /// `None` when nothing is bound under `name`, when `F` is not the calling
    /// shape it was declared with, or when no image is loaded.
    ///
    /// The callable borrows `self`, so the image cannot be freed, reloaded,
    /// disposed or dropped while it is in scope:
    ///
    /// ```compile_fail
    /// use dynbind_abi::function_catalogue;
    /// use dynbind_core::NativeLibrary;
    ///
    /// function_catalogue! {
    ///     static MATH = unsafe {
    ///         Add => "add": extern "C" fn(i32, i32) -> i32,
    ///     };
    /// }
    ///
    /// let mut library = NativeLibrary::new("math", MATH);
    /// let add = library.get_function::<extern "C" fn(i32, i32) -> i32>("add");
    /// library.free_library();
    /// let _ = add.map(|add| add(2, 3));
    /// ```
    #[must_use]
    pub fn get_function<F: NativeSignature>(&self, name: &str) -> Option<Bound<'_, F>> {
        self.table.get_as(name)
    }

    /// Like [`get_function`](Self::get_function), but explains a miss.
    ///
    /// # Errors
    ///
    /// - [`BinderError::Disposed`] if the instance was disposed.
    /// - [`BinderError::FunctionNotBound`] if nothing is bound under `name`.
    /// - [`BinderError::SignatureMismatch`] if `F` is not the declared shape.
    pub fn function<F: NativeSignature>(
        &self,
        name: &str,
    ) -> Result<Bound<'_, F>, BinderError> {
        if self.disposed {
            return Err(BinderError::Disposed);
        }
        let bound = self
            .table
            .get(name)
            .ok_or_else(|| BinderError::FunctionNotBound(name.to_string()))?;
        bound.get::<F>().ok_or_else(|| BinderError::SignatureMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<F>(),
            actual: bound.signature(),
        })
    }

    /// The type-erased binding for `name`.
    #[must_use]
    pub fn bound_function(&self, name: &str) -> Option<&BoundFunction> {
        self.table.get(name)
    }

    /// Sorted names of the currently bound functions.
    #[must_use]
    pub fn bound_functions(&self) -> Vec<&str> {
        self.table.names()
    }

    #[must_use]
    pub fn is_library_loaded(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Platform file name derived from the logical name, e.g. `libassimp.so`.
    #[must_use]
    pub fn default_library_name(&self) -> &str {
        &self.default_library_name
    }

    #[must_use]
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Path the current image was loaded from.
    #[must_use]
    pub fn loaded_path(&self) -> Option<&Path> {
        self.loaded_path.as_deref()
    }

    #[must_use]
    pub fn throw_on_load_failure(&self) -> bool {
        self.throw_on_load_failure
    }

    /// Affects future loads only.
    pub fn set_throw_on_load_failure(&mut self, throw: bool) {
        self.throw_on_load_failure = throw;
    }

    #[must_use]
    pub fn catalogue(&self) -> &FunctionCatalogue {
        &self.catalogue
    }

    #[must_use]
    pub fn loader(&self) -> &L {
        &self.loader
    }

    fn default_path(&self) -> PathBuf {
        self.configured_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.default_library_name))
    }

    fn load_failed(&self, failure: LoadFailure) -> Result<bool, BinderError> {
        if self.throw_on_load_failure {
            warn!(
                library = %self.logical_name,
                path = %failure.path,
                reason = %failure.reason,
                "Failed to load native library"
            );
            Err(failure.into())
        } else {
            debug!(
                library = %self.logical_name,
                path = %failure.path,
                reason = %failure.reason,
                "Native library not loaded"
            );
            Ok(false)
        }
    }

    /// The single release primitive. The handle leaves `self` before the
    /// loader sees it, so no path can release it twice.
    fn release(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };

        self.table.clear();
        let path = self.loaded_path.take().unwrap_or_default();
        info!(
            library = %self.logical_name,
            path = %path.display(),
            "Unloading native library"
        );
        self.loader.unload(handle);
        true
    }
}

impl<L: NativeLoader> Drop for NativeLibrary<L> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<L: NativeLoader> fmt::Debug for NativeLibrary<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("logical_name", &self.logical_name)
            .field("default_library_name", &self.default_library_name)
            .field("loaded_path", &self.loaded_path)
            .field("bound", &self.table.len())
            .field("throw_on_load_failure", &self.throw_on_load_failure)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`NativeLibrary`].
///
/// # Default Configuration
///
/// - Naming: [`host_platform`]
/// - Loader: [`SystemLoader`]
/// - Resolver: [`AnnotatedSymbols`]
/// - Diagnostics: [`TracingDiagnostics`]
/// - Throw on load failure: `true`
pub struct NativeLibraryBuilder<L: NativeLoader = SystemLoader> {
    logical_name: String,
    catalogue: FunctionCatalogue,
    platform: Option<Box<dyn PlatformNaming>>,
    loader: L,
    resolver: Box<dyn SymbolNameResolver + Send + Sync>,
    diagnostics: Box<dyn BindingDiagnostics>,
    configured_path: Option<PathBuf>,
    throw_on_load_failure: bool,
}

impl NativeLibraryBuilder<SystemLoader> {
    #[must_use]
    pub fn new(default_logical_name: impl Into<String>, catalogue: FunctionCatalogue) -> Self {
        Self {
            logical_name: default_logical_name.into(),
            catalogue,
            platform: None,
            loader: SystemLoader,
            resolver: Box::new(AnnotatedSymbols),
            diagnostics: Box::new(TracingDiagnostics),
            configured_path: None,
            throw_on_load_failure: true,
        }
    }
}

impl<L: NativeLoader> NativeLibraryBuilder<L> {
    /// Replaces the loader gateway.
    #[must_use]
    pub fn with_loader<M: NativeLoader>(self, loader: M) -> NativeLibraryBuilder<M> {
        NativeLibraryBuilder {
            logical_name: self.logical_name,
            catalogue: self.catalogue,
            platform: self.platform,
            loader,
            resolver: self.resolver,
            diagnostics: self.diagnostics,
            configured_path: self.configured_path,
            throw_on_load_failure: self.throw_on_load_failure,
        }
    }

    /// Uses another platform's naming for the default library name.
    #[must_use]
    pub fn with_platform(mut self, platform: impl PlatformNaming + 'static) -> Self {
        self.platform = Some(Box::new(platform));
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: impl SymbolNameResolver + Send + Sync + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: impl BindingDiagnostics + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    /// Path loaded when `load_library` is called without one.
    #[must_use]
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.configured_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn throw_on_load_failure(mut self, throw: bool) -> Self {
        self.throw_on_load_failure = throw;
        self
    }

    /// Applies the settings present in `config`; absent keys keep their
    /// current values.
    #[must_use]
    pub fn with_config(mut self, config: &LibraryConfig) -> Self {
        if let Some(path) = &config.path {
            self.configured_path = Some(path.clone());
        }
        if let Some(throw) = config.throw_on_load_failure {
            self.throw_on_load_failure = throw;
        }
        self
    }

    #[must_use]
    pub fn build(self) -> NativeLibrary<L> {
        let platform: &dyn PlatformNaming = match &self.platform {
            Some(platform) => &**platform,
            None => host_platform(),
        };
        let default_library_name = platform.build_library_filename(&self.logical_name);

        NativeLibrary {
            logical_name: self.logical_name,
            default_library_name,
            configured_path: self.configured_path,
            catalogue: self.catalogue,
            resolver: self.resolver,
            diagnostics: self.diagnostics,
            loader: self.loader,
            handle: None,
            loaded_path: None,
            table: SymbolTable::new(),
            throw_on_load_failure: self.throw_on_load_failure,
            disposed: false,
        }
    }
}

impl<L: NativeLoader> fmt::Debug for NativeLibraryBuilder<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibraryBuilder")
            .field("logical_name", &self.logical_name)
            .field("catalogue", &self.catalogue.len())
            .field("configured_path", &self.configured_path)
            .field("throw_on_load_failure", &self.throw_on_load_failure)
            .finish_non_exhaustive()
    }
}
