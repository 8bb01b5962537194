//! Dynamic native-library binding.
//!
//! This crate locates and loads a platform shared library, resolves a fixed
//! catalogue of exported functions into typed pointers, and guarantees the
//! image is released exactly once, whether through [`NativeLibrary::free_library`],
//! [`NativeLibrary::dispose`], a reload, or `Drop`.
//!
//! # Key Components
//!
//! - **Platform naming**: [`PlatformNaming`] turns a logical name into a file
//!   name (`assimp` becomes `libassimp.so`, `libassimp.dylib` or `assimp.dll`)
//! - **Loader gateway**: [`NativeLoader`] / [`SystemLoader`] wrap the OS loader
//! - **Binding table**: [`SymbolTable`] caches the typed functions of one load
//! - **Lifecycle**: [`NativeLibrary`] owns the handle and drives the others
//! - **Configuration**: [`Config`] reads per-library overrides from TOML
//!
//! # Example
//!
//! ```no_run
//! use dynbind_abi::function_catalogue;
//! use dynbind_core::NativeLibrary;
//!
//! function_catalogue! {
//!     static MATH = unsafe {
//!         Add => "add": extern "C" fn(i32, i32) -> i32,
//!     };
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut library = NativeLibrary::new("math", MATH);
//! library.load_library(None)?;
//!
//! if let Some(add) = library.get_function::<extern "C" fn(i32, i32) -> i32>("add") {
//!     assert_eq!(add(2, 3), 5);
//! }
//! library.free_library();
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`NativeLibrary`] is `Send + Sync` but every state change takes `&mut self`.
//! Callers sharing one instance across threads wrap it in a mutex; the
//! platform loaders are not reentrant enough for finer-grained locking to help.

mod config;
mod diagnostics;
mod gateway;
mod library;
mod naming;
mod table;

/// Per-library configuration read from TOML.
pub use config::{Config, ConfigError, LibraryConfig};
/// Reporting of descriptors that could not be bound.
pub use diagnostics::{BindingDefect, BindingDiagnostics, CollectingDiagnostics, TracingDiagnostics};
/// OS-level loading primitives.
pub use gateway::{LoadFailure, NativeLoader, SystemLoader};
/// Handle lifecycle.
pub use library::{BinderError, NativeLibrary, NativeLibraryBuilder};
/// Platform file name conventions.
pub use naming::{Linux, MacOs, PlatformNaming, Windows, change_extension, host_platform};
/// Symbol binding table.
pub use table::{BindingReport, SymbolTable};
