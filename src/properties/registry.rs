//! Property registry: logical name → hot-reloadable property source.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::source::PropertySource;
use crate::config::{resolve_path, PropertiesConfig, PropertyFileConfig};

/// Fixed set of property sources exposed to every render.
///
/// Membership is decided once at construction; only the contents of each
/// source change afterwards.
#[derive(Debug, Default)]
pub struct PropertyRegistry {
    sources: BTreeMap<String, Arc<PropertySource>>,
}

impl PropertyRegistry {
    /// Build the registry from property declarations.
    ///
    /// Relative paths resolve against `config_dir`. Declarations whose file is
    /// missing or unreadable are skipped with a warning.
    pub fn from_config(config: &PropertiesConfig, config_dir: &Path) -> Self {
        let mut sources = BTreeMap::new();

        for decl in &config.files {
            let Some(source) = Self::open_declared(decl, config.reload_interval_ms, config_dir)
            else {
                continue;
            };
            if sources.contains_key(source.name()) {
                tracing::warn!(
                    name = %source.name(),
                    path = ?source.path(),
                    "Duplicate property source name, keeping the first declaration"
                );
                continue;
            }
            sources.insert(source.name().to_string(), Arc::new(source));
        }

        tracing::info!(count = sources.len(), "Property registry initialized");
        Self { sources }
    }

    fn open_declared(
        decl: &PropertyFileConfig,
        global_interval_ms: u64,
        config_dir: &Path,
    ) -> Option<PropertySource> {
        let path = resolve_path(config_dir, &decl.path);
        let Some(name) = decl.logical_name() else {
            tracing::warn!(?path, "Skipping property file: cannot derive a name");
            return None;
        };

        if !path.is_file() {
            tracing::warn!(%name, ?path, "Skipping property file: not found");
            return None;
        }

        match PropertySource::open(&name, &path, decl.reload_interval(global_interval_ms)) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::warn!(%name, ?path, error = %e, "Skipping property file: cannot read");
                None
            }
        }
    }

    /// Add a pre-opened source, replacing any source with the same name.
    pub fn with_source(mut self, source: PropertySource) -> Self {
        self.sources
            .insert(source.name().to_string(), Arc::new(source));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PropertySource>> {
        self.sources.get(name)
    }

    /// All sources, ordered by name.
    pub fn snapshot(&self) -> &BTreeMap<String, Arc<PropertySource>> {
        &self.sources
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
