//! Engine settings file loading and path resolution.

use std::path::{Path, PathBuf};

use super::EngineConfig;
use crate::error::{StencilError, StencilResult};

/// Load engine settings from a TOML file.
///
/// Unlike developer-facing config, settings are required to be valid: an
/// unreadable or malformed file is a fatal configuration error.
pub fn load_engine_config(path: &Path) -> StencilResult<EngineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        StencilError::config(format!("failed to read {}: {e}", path.display()))
    })?;
    let config = EngineConfig::from_toml_str(&contents)?;
    tracing::debug!(?path, "Loaded engine settings");
    Ok(config)
}

/// Resolve `path` against `base`, expanding a leading `~/` to the home directory.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
