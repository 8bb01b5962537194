//! Platform naming conventions for shared libraries.
//!
//! A logical library name such as `assimp` maps to `libassimp.so` on Linux,
//! `libassimp.dylib` on macOS and `assimp.dll` on Windows. Each convention is a
//! [`PlatformNaming`] implementation; nothing else in the crate is platform
//! specific.

/// Prefix and extension rules for one target platform.
pub trait PlatformNaming: Send + Sync {
    /// Shared library extension, with or without the leading dot.
    fn dll_extension(&self) -> &str;

    /// Prefix prepended to the library file name.
    fn dll_prefix(&self) -> &str {
        ""
    }

    /// Computes `prefix ++ change_extension(logical_name, extension)`.
    ///
    /// An empty logical name yields an empty string.
    fn build_library_filename(&self, logical_name: &str) -> String {
        if logical_name.is_empty() {
            return String::new();
        }
        let mut filename = String::with_capacity(
            self.dll_prefix().len() + logical_name.len() + self.dll_extension().len() + 1,
        );
        filename.push_str(self.dll_prefix());
        filename.push_str(&change_extension(logical_name, self.dll_extension()));
        filename
    }
}

/// `lib` + `.so`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linux;

/// `lib` + `.dylib`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacOs;

/// No prefix + `.dll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Windows;

impl PlatformNaming for Linux {
    fn dll_extension(&self) -> &str {
        "so"
    }

    fn dll_prefix(&self) -> &str {
        "lib"
    }
}

impl PlatformNaming for MacOs {
    fn dll_extension(&self) -> &str {
        "dylib"
    }

    fn dll_prefix(&self) -> &str {
        "lib"
    }
}

impl PlatformNaming for Windows {
    fn dll_extension(&self) -> &str {
        "dll"
    }
}

/// Returns the naming convention of the compile target.
#[must_use]
pub fn host_platform() -> &'static dyn PlatformNaming {
    #[cfg(windows)]
    {
        &Windows
    }
    #[cfg(target_vendor = "apple")]
    {
        &MacOs
    }
    #[cfg(not(any(windows, target_vendor = "apple")))]
    {
        &Linux
    }
}

/// Replaces the extension of the last path component of `path`.
///
/// The extension is the text after the last `.` of the final component; when
/// there is none, `extension` is appended. A trailing `.` is kept as the
/// separator. `extension` may be given with or without its leading dot; an
/// empty `extension` removes the existing one.
#[must_use]
pub fn change_extension(path: &str, extension: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let component_start = path.rfind(['/', '\\']).map_or(0, |idx| idx + 1);
    let stem = match path[component_start..].rfind('.') {
        Some(dot) => &path[..component_start + dot],
        None => path,
    };

    let extension = extension.strip_prefix('.').unwrap_or(extension);
    if extension.is_empty() {
        return stem.to_string();
    }
    format!("{stem}.{extension}")
}
