//! # Resource Loaders
//!
//! A loader turns a template reference name into source text. Each loader has
//! its own caching and staleness policy; the [`ResourceResolver`] consults them
//! in a fixed order.
//!
//! [`ResourceResolver`]: super::ResourceResolver

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crate::config::LoaderSettings;
use crate::error::StencilResult;
use crate::properties::source::lock;

/// How often a loader re-stats a cached resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInterval {
    /// Cached forever once loaded.
    Never,
    /// Re-stat once the interval has elapsed since the last check.
    Every(Duration),
    /// Re-stat on every request.
    Always,
}

impl CheckInterval {
    /// `0` never rechecks, a positive value rechecks every N seconds, a
    /// negative value rechecks always.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            0 => CheckInterval::Never,
            s if s > 0 => CheckInterval::Every(Duration::from_secs(s.unsigned_abs())),
            _ => CheckInterval::Always,
        }
    }

    fn due(&self, last_check: Instant, now: Instant) -> bool {
        match self {
            CheckInterval::Never => false,
            CheckInterval::Every(interval) => now.duration_since(last_check) >= *interval,
            CheckInterval::Always => true,
        }
    }
}

/// Template source text produced by a loader.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Reference name the resource was requested under.
    pub name: String,
    /// Name of the loader that produced it.
    pub loader: String,
    pub path: PathBuf,
    pub source: Arc<str>,
    pub modified: Option<SystemTime>,
}

/// A named strategy for turning a reference into source text.
pub trait ResourceLoader: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Load `name`, or `Ok(None)` when this loader does not have it.
    fn load(&self, name: &str) -> StencilResult<Option<Resource>>;

    /// Re-check a previously loaded resource under this loader's staleness
    /// policy, returning the fresh copy only when it changed.
    fn refresh(&self, resource: &Resource) -> StencilResult<Option<Resource>>;

    /// Forget any cached copy of `name`.
    fn evict(&self, _name: &str) {}
}

/// Loader over one or more directories, searched in order.
///
/// Content is cached only when the loader is configured to cache, but the time
/// of the last staleness check is kept per name either way so the interval
/// throttles disk access on every path.
#[derive(Debug)]
pub struct FileResourceLoader {
    settings: LoaderSettings,
    cache: Mutex<HashMap<String, Resource>>,
    checks: Mutex<HashMap<String, Instant>>,
}

impl FileResourceLoader {
    pub fn new(settings: LoaderSettings) -> Self {
        tracing::debug!(
            loader = %settings.name,
            paths = ?settings.paths,
            cache = settings.cache,
            check_interval = ?settings.check_interval,
            "Resource loader configured"
        );
        Self {
            settings,
            cache: Mutex::new(HashMap::new()),
            checks: Mutex::new(HashMap::new()),
        }
    }

    /// First existing file for `name` across the search paths.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let relative = safe_relative(name)?;
        self.settings
            .paths
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }

    fn read(&self, name: &str, path: PathBuf) -> StencilResult<Resource> {
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        let source = std::fs::read_to_string(&path)?;
        Ok(Resource {
            name: name.to_string(),
            loader: self.settings.name.clone(),
            path,
            source: Arc::from(source),
            modified,
        })
    }

    /// Record a check of `name` now if one is due. Names never checked are
    /// always due.
    fn claim_check(&self, name: &str) -> bool {
        let now = Instant::now();
        let mut checks = lock(&self.checks);
        let due = checks
            .get(name)
            .map_or(true, |last| self.settings.check_interval.due(*last, now));
        if due {
            checks.insert(name.to_string(), now);
        }
        due
    }

    fn remember(&self, resource: &Resource) {
        lock(&self.checks).insert(resource.name.clone(), Instant::now());
        if self.settings.cache {
            lock(&self.cache).insert(resource.name.clone(), resource.clone());
        }
    }

    fn cached(&self, name: &str) -> Option<Resource> {
        if !self.settings.cache {
            return None;
        }
        lock(&self.cache).get(name).cloned()
    }
}

impl ResourceLoader for FileResourceLoader {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn load(&self, name: &str) -> StencilResult<Option<Resource>> {
        if let Some(cached) = self.cached(name) {
            if !self.claim_check(name) {
                return Ok(Some(cached));
            }
            let on_disk = std::fs::metadata(&cached.path)
                .and_then(|m| m.modified())
                .ok();
            if on_disk.is_some() && on_disk <= cached.modified {
                return Ok(Some(cached));
            }
        }

        let Some(path) = self.locate(name) else {
            self.evict(name);
            return Ok(None);
        };
        let resource = self.read(name, path)?;
        self.remember(&resource);
        Ok(Some(resource))
    }

    fn refresh(&self, resource: &Resource) -> StencilResult<Option<Resource>> {
        if self.settings.check_interval == CheckInterval::Never {
            return Ok(None);
        }

        if !self.claim_check(&resource.name) {
            // Another caller may already have picked up a newer copy.
            let newer = self
                .cached(&resource.name)
                .filter(|cached| cached.modified > resource.modified);
            return Ok(newer);
        }

        let on_disk = match std::fs::metadata(&resource.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::debug!(
                    loader = %self.settings.name,
                    name = %resource.name,
                    error = %e,
                    "Resource no longer accessible, keeping loaded copy"
                );
                return Ok(None);
            }
        };
        if resource.modified.is_some_and(|loaded| on_disk <= loaded) {
            return Ok(None);
        }

        let fresh = self.read(&resource.name, resource.path.clone())?;
        tracing::debug!(
            loader = %self.settings.name,
            name = %resource.name,
            "Resource changed on disk"
        );
        self.remember(&fresh);
        Ok(Some(fresh))
    }

    fn evict(&self, name: &str) {
        lock(&self.cache).remove(name);
        lock(&self.checks).remove(name);
    }
}

/// `name` as a path confined to a loader root, or `None` if it would escape.
fn safe_relative(name: &str) -> Option<&Path> {
    let path = Path::new(name);
    if name.is_empty() {
        return None;
    }
    let confined = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    confined.then_some(path)
}
