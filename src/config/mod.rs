//! # Engine Configuration
//!
//! Settings consumed once at engine construction. Nothing here is hot-reloaded;
//! only the *contents* of property files and loader-managed templates change at
//! runtime.
//!
//! ## Example
//!
//! ```toml
//! config-dir = "config"
//! scripts-dir = "config/scripts"
//!
//! [engine]
//! cache-marker = "{# cache #}"
//! buffer-pool-size = 16
//!
//! [properties]
//! reload-interval-ms = 1000
//!
//! [[properties.files]]
//! name = "cfg"
//! path = "props/cfg.properties"
//!
//! [scripts]
//! check-interval-secs = 60
//!
//! [[loaders]]
//! name = "shared"
//! paths = ["/opt/shared-templates"]
//! check-interval-secs = -1
//! ```

pub mod loader;

pub use loader::{load_engine_config, resolve_path};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{StencilError, StencilResult};
use crate::resources::CheckInterval;

/// Marker line that selects the materialized compilation strategy.
pub const DEFAULT_CACHE_MARKER: &str = "{# cache #}";

/// The only loader kind currently understood.
pub const FILE_LOADER_KIND: &str = "file";

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_cache_marker() -> String {
    DEFAULT_CACHE_MARKER.to_string()
}

fn default_buffer_pool_size() -> usize {
    16
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_max_retained_buffer() -> usize {
    64 * 1024
}

fn default_reload_interval_ms() -> u64 {
    1000
}

fn default_scripts_check_interval_secs() -> i64 {
    60
}

/// Top-level engine settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Base directory for relative property file paths. Default: `config`.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Host-managed directory of stored templates. Default: `<config-dir>/scripts`.
    pub scripts_dir: Option<PathBuf>,

    /// Where materialized templates are written. Default: a private temp directory.
    pub work_dir: Option<PathBuf>,

    #[serde(default)]
    pub engine: EngineOptions,

    #[serde(default)]
    pub properties: PropertiesConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// User-declared loaders, consulted after the built-in ones in this order.
    #[serde(default)]
    pub loaders: Vec<LoaderConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            scripts_dir: None,
            work_dir: None,
            engine: EngineOptions::default(),
            properties: PropertiesConfig::default(),
            scripts: ScriptsConfig::default(),
            loaders: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Engine settings rooted at `config_dir`, everything else defaulted.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(contents: &str) -> StencilResult<Self> {
        toml::from_str(contents)
            .map_err(|e| StencilError::config(format!("invalid engine settings: {e}")))
    }

    /// Stored-template directory, defaulting to `<config-dir>/scripts`.
    pub fn scripts_dir(&self) -> PathBuf {
        match &self.scripts_dir {
            Some(dir) => resolve_path(&self.config_dir, dir),
            None => self.config_dir.join("scripts"),
        }
    }
}

/// Raw templating-engine options.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct EngineOptions {
    /// First line that marks a source for materialization.
    #[serde(default = "default_cache_marker")]
    pub cache_marker: String,

    /// Maximum number of idle output buffers kept for reuse.
    #[serde(default = "default_buffer_pool_size")]
    pub buffer_pool_size: usize,

    /// Capacity of a freshly allocated output buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Buffers that grew beyond this are dropped instead of pooled.
    #[serde(default = "default_max_retained_buffer")]
    pub max_retained_buffer: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_marker: default_cache_marker(),
            buffer_pool_size: default_buffer_pool_size(),
            buffer_capacity: default_buffer_capacity(),
            max_retained_buffer: default_max_retained_buffer(),
        }
    }
}

/// Property file declarations.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PropertiesConfig {
    /// Global recheck interval. `0` stats the file on every access.
    #[serde(default = "default_reload_interval_ms")]
    pub reload_interval_ms: u64,

    #[serde(default)]
    pub files: Vec<PropertyFileConfig>,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            reload_interval_ms: default_reload_interval_ms(),
            files: Vec::new(),
        }
    }
}

/// A single `(name, path)` property declaration.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PropertyFileConfig {
    /// Logical name templates use. Defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,

    /// Path relative to `config-dir` (absolute paths are used as is).
    pub path: PathBuf,

    /// Overrides the global reload interval for this file.
    pub reload_interval_ms: Option<u64>,
}

impl PropertyFileConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
            reload_interval_ms: None,
        }
    }

    /// Declared name, falling back to the base filename without extension.
    pub fn logical_name(&self) -> Option<String> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => self
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string),
        }
    }

    pub fn reload_interval(&self, global_ms: u64) -> Duration {
        Duration::from_millis(self.reload_interval_ms.unwrap_or(global_ms))
    }
}

/// Policy of the built-in stored-template loader.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ScriptsConfig {
    /// `0` never rechecks, positive rechecks every N seconds, negative always.
    #[serde(default = "default_scripts_check_interval_secs")]
    pub check_interval_secs: i64,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_scripts_check_interval_secs(),
        }
    }
}

/// A user-declared loader. Unset fields are defaulted, set fields are kept.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct LoaderConfig {
    pub name: String,
    pub kind: Option<String>,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    pub cache: Option<bool>,
    pub check_interval_secs: Option<i64>,
}

/// A loader declaration with every property filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub name: String,
    pub paths: Vec<PathBuf>,
    pub cache: bool,
    pub check_interval: CheckInterval,
}

impl LoaderConfig {
    /// Fill in defaults for anything the user left unset.
    ///
    /// Missing paths default to `<config-dir>/<name>`; relative paths resolve
    /// against `config_dir`.
    pub fn resolve(
        &self,
        config_dir: &Path,
        default_interval_secs: i64,
    ) -> StencilResult<LoaderSettings> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(StencilError::config("loader declared without a name"));
        }

        let kind = self.kind.as_deref().unwrap_or(FILE_LOADER_KIND);
        if kind != FILE_LOADER_KIND {
            return Err(StencilError::config(format!(
                "loader '{name}' has unsupported kind '{kind}'"
            )));
        }

        let paths = if self.paths.is_empty() {
            vec![config_dir.join(name)]
        } else {
            self.paths
                .iter()
                .map(|p| resolve_path(config_dir, p))
                .collect()
        };

        Ok(LoaderSettings {
            name: name.to_string(),
            paths,
            cache: self.cache.unwrap_or(true),
            check_interval: CheckInterval::from_secs(
                self.check_interval_secs.unwrap_or(default_interval_secs),
            ),
        })
    }
}
