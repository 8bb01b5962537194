//! Per-library configuration.
//!
//! Settings live in a TOML file with one table per logical library name:
//!
//! ```toml
//! [libraries.assimp]
//! path = "/opt/assimp/lib/libassimp.so"
//! throw_on_load_failure = false
//! ```
//!
//! Both keys are optional. The environment variable `DYNBIND_<NAME>_PATH`
//! (name upper-cased, `-` and `.` replaced by `_`) overrides `path`.

use std::{
    collections::HashMap,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error when a config file is malformed.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file not found.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Settings keyed by logical library name.
    #[serde(default)]
    pub libraries: HashMap<String, LibraryConfig>,
}

/// Settings for one logical library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Explicit image path used when no path is passed to `load_library`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Overrides the binder's throw-on-load-failure flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throw_on_load_failure: Option<bool>,
}

impl Config {
    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or contains
    /// unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist,
    /// [`ConfigError::Io`] if it cannot be read and [`ConfigError::Parse`] if
    /// it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::from_toml_str(&contents)
    }

    /// Settings declared in the file for `name`, if any.
    #[must_use]
    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries.get(name)
    }

    /// Effective settings for `name`: the file's entry (or defaults) with
    /// environment overrides applied.
    #[must_use]
    pub fn library_config(&self, name: &str) -> LibraryConfig {
        self.library(name)
            .cloned()
            .unwrap_or_default()
            .with_env_overrides(name)
    }
}

impl LibraryConfig {
    /// Name of the environment variable that overrides the path of `name`.
    #[must_use]
    pub fn env_var_name(name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("DYNBIND_{normalized}_PATH")
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self, name: &str) -> Self {
        self.with_overrides_from(name, |key| std::env::var_os(key))
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    #[must_use]
    pub fn with_overrides_from(
        mut self,
        name: &str,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Self {
        if let Some(path) = lookup(&Self::env_var_name(name)).filter(|value| !value.is_empty()) {
            self.path = Some(PathBuf::from(path));
        }
        self
    }
}
