//! Ordered loader chain and template dependency collection.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::loader::{CheckInterval, FileResourceLoader, Resource, ResourceLoader};
use crate::config::{EngineConfig, LoaderSettings};
use crate::error::{StencilError, StencilResult};

/// Loader for materialized templates in the engine's working directory.
pub const EPHEMERAL_LOADER: &str = "ephemeral";

/// Loader for host-managed stored templates.
pub const SCRIPTS_LOADER: &str = "scripts";

/// Tera comments and `{% raw %}` blocks. Nothing inside them is a reference.
static INERT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*raw\s*-?%\}.*?\{%-?\s*endraw\s*-?%\}|\{#.*?#\}")
        .expect("inert span pattern is valid")
});

/// `{% include "x" %}`, `{% include ["x", "y"] %}`, `{% import "x" as m %}`
/// and `{% extends "x" %}`.
static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{%-?\s*(?:include|import|extends)\s+(?:"([^"]+)"|'([^']+)'|\[([^\]]*)\])([^%]*)-?%\}"#,
    )
    .expect("reference pattern is valid")
});

static CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("candidate pattern is valid"));

/// A template referenced from another template's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    /// Names tried in order; the first one a loader has is used.
    pub candidates: Vec<String>,
    /// `include ... ignore missing`: unresolvable references are skipped.
    pub optional: bool,
}

impl TemplateReference {
    fn describe(&self) -> String {
        self.candidates.join(", ")
    }
}

/// Every template reference `source` makes outside comments and raw blocks.
pub fn references(source: &str) -> Vec<TemplateReference> {
    let visible = INERT_RE.replace_all(source, "");
    REFERENCE_RE
        .captures_iter(&visible)
        .filter_map(|caps| {
            let candidates: Vec<String> = match caps.get(3) {
                Some(list) => CANDIDATE_RE
                    .captures_iter(list.as_str())
                    .filter_map(|c| c.get(1).or_else(|| c.get(2)))
                    .map(|m| m.as_str().to_string())
                    .collect(),
                None => vec![caps.get(1).or_else(|| caps.get(2))?.as_str().to_string()],
            };
            if candidates.is_empty() {
                return None;
            }
            let optional = caps
                .get(4)
                .is_some_and(|rest| rest.as_str().contains("ignore missing"));
            Some(TemplateReference {
                candidates,
                optional,
            })
        })
        .collect()
}

/// Fixed-order chain of resource loaders.
///
/// Order is `ephemeral`, then `scripts`, then user-declared loaders in
/// declaration order. The first loader that has a resource wins.
#[derive(Debug)]
pub struct ResourceResolver {
    loaders: Vec<Arc<dyn ResourceLoader>>,
}

impl ResourceResolver {
    /// Build the chain for an engine whose materialized templates live in `work_dir`.
    pub fn from_config(config: &EngineConfig, work_dir: &Path) -> StencilResult<Self> {
        let mut settings = vec![
            LoaderSettings {
                name: EPHEMERAL_LOADER.to_string(),
                paths: vec![work_dir.to_path_buf()],
                cache: true,
                check_interval: CheckInterval::Never,
            },
            LoaderSettings {
                name: SCRIPTS_LOADER.to_string(),
                paths: vec![config.scripts_dir()],
                cache: true,
                check_interval: CheckInterval::from_secs(config.scripts.check_interval_secs),
            },
        ];

        for loader in &config.loaders {
            settings.push(loader.resolve(&config.config_dir, config.scripts.check_interval_secs)?);
        }

        let loaders = settings
            .into_iter()
            .map(|s| Arc::new(FileResourceLoader::new(s)) as Arc<dyn ResourceLoader>)
            .collect();
        Self::new(loaders)
    }

    /// Chain over pre-built loaders. Loader names must be unique.
    pub fn new(loaders: Vec<Arc<dyn ResourceLoader>>) -> StencilResult<Self> {
        let mut seen = HashSet::new();
        for loader in &loaders {
            if !seen.insert(loader.name().to_string()) {
                return Err(StencilError::config(format!(
                    "duplicate resource loader name '{}'",
                    loader.name()
                )));
            }
        }
        Ok(Self { loaders })
    }

    /// Loader names in resolution order.
    pub fn loader_names(&self) -> Vec<&str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Resolve `name` through the chain.
    pub fn resolve(&self, name: &str) -> StencilResult<Resource> {
        self.try_resolve(name)?
            .ok_or_else(|| StencilError::not_found(name))
    }

    fn try_resolve(&self, name: &str) -> StencilResult<Option<Resource>> {
        for loader in &self.loaders {
            if let Some(resource) = loader.load(name)? {
                tracing::trace!(%name, loader = %loader.name(), "Resolved template reference");
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }

    fn resolve_first(&self, candidates: &[String]) -> StencilResult<Option<Resource>> {
        for name in candidates {
            if let Some(resource) = self.try_resolve(name)? {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }

    /// Drop cached copies of `name` from every loader.
    pub fn evict(&self, name: &str) {
        for loader in &self.loaders {
            loader.evict(name);
        }
    }

    /// `root` plus every template it transitively references.
    ///
    /// Fails with `NotFound` for any required reference no loader has.
    pub fn collect(&self, root: Resource) -> StencilResult<Vec<Resource>> {
        let mut known = HashSet::from([root.name.clone()]);
        self.collect_from(vec![root], &mut known)
    }

    fn collect_from(
        &self,
        start: Vec<Resource>,
        known: &mut HashSet<String>,
    ) -> StencilResult<Vec<Resource>> {
        let mut queue: VecDeque<Resource> = start.into();
        let mut collected = Vec::new();

        while let Some(resource) = queue.pop_front() {
            for reference in references(&resource.source) {
                if reference.candidates.iter().any(|name| known.contains(name)) {
                    continue;
                }
                match self.resolve_first(&reference.candidates)? {
                    Some(dep) => {
                        known.insert(dep.name.clone());
                        queue.push_back(dep);
                    }
                    None if reference.optional => {
                        tracing::debug!(
                            template = %resource.name,
                            missing = %reference.describe(),
                            "Skipping optional include"
                        );
                    }
                    None => return Err(StencilError::not_found(reference.describe())),
                }
            }
            collected.push(resource);
        }

        Ok(collected)
    }

    /// Re-check `loaded` against their loaders' staleness policies.
    ///
    /// Returns the resources that changed on disk, plus anything newly
    /// referenced by the changed sources.
    pub fn refresh(&self, loaded: &[Resource]) -> StencilResult<Vec<Resource>> {
        let mut changed = Vec::new();
        for resource in loaded {
            let Some(loader) = self.loaders.iter().find(|l| l.name() == resource.loader) else {
                continue;
            };
            if let Some(fresh) = loader.refresh(resource)? {
                changed.push(fresh);
            }
        }

        if changed.is_empty() {
            return Ok(changed);
        }

        let mut known: HashSet<String> = loaded.iter().map(|r| r.name.clone()).collect();
        self.collect_from(changed, &mut known)
    }
}
