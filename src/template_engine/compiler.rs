//! # Template Compiler
//!
//! Turns source text into a [`CompiledTemplate`] and owns the lifecycle of the
//! files it materializes.
//!
//! ## Strategies
//!
//! - **Ephemeral**: the source is parsed straight from memory under a short
//!   trace id derived from its content. No file is written; its references
//!   still resolve through the resource chain.
//! - **Materialized**: selected by a marker first line. The remaining body is
//!   written to a uniquely named file in the working directory and parsed by
//!   name through the resource chain, so `include`/`import`/`extends` can reach
//!   sibling and stored templates.
//!
//! Stored templates (`compile_stored`) are parsed by name straight from the
//! loader chain with their dependencies, like materialized ones.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tera::Tera;

use super::environment::TemplateEnvironment;
use crate::error::{StencilError, StencilResult};
use crate::properties::source::lock;
use crate::resources::{Resource, ResourceResolver};

const MATERIALIZED_PREFIX: &str = "tmpl-";
const MATERIALIZED_SUFFIX: &str = ".tera";

/// Loader label of in-memory sources. No loader in the chain has this name, so
/// an inline root is never refreshed.
const INLINE_SOURCE: &str = "inline";

/// Option key forcing a strategy regardless of the marker line.
pub const STRATEGY_OPTION: &str = "strategy";

/// Host-supplied compile options, kept on the compiled template.
pub type CompileOptions = HashMap<String, String>;

/// How a source string is turned into a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStrategy {
    Ephemeral,
    Materialized,
}

impl CompileStrategy {
    /// Pick the strategy for `source`, returning the text to compile.
    ///
    /// A first line equal to `marker` selects materialization and is stripped
    /// from the body.
    pub fn classify<'a>(source: &'a str, marker: &str) -> (Self, &'a str) {
        let (first, rest) = match source.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (source, ""),
        };
        if !marker.is_empty() && first.trim_end_matches('\r').trim() == marker {
            (CompileStrategy::Materialized, rest)
        } else {
            (CompileStrategy::Ephemeral, source)
        }
    }

    fn from_option(options: &CompileOptions) -> StencilResult<Option<Self>> {
        match options.get(STRATEGY_OPTION).map(String::as_str) {
            None => Ok(None),
            Some("ephemeral") => Ok(Some(CompileStrategy::Ephemeral)),
            Some("materialized") => Ok(Some(CompileStrategy::Materialized)),
            Some(other) => Err(StencilError::compile(
                STRATEGY_OPTION,
                format!("unknown compile strategy '{other}'"),
            )),
        }
    }
}

/// Where a template's authoritative source lives. Exactly one per template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOrigin {
    /// In-memory source text.
    Inline,
    /// A file this engine wrote into its working directory.
    Materialized(PathBuf),
    /// A stored template resolved by name from the loader chain.
    Stored,
}

/// A parsed Tera unit plus the loader resources it was built from.
#[derive(Debug)]
pub(crate) struct TemplateUnit {
    entry: String,
    tera: RwLock<Tera>,
    resources: Mutex<Vec<Resource>>,
}

impl TemplateUnit {
    pub(crate) fn entry(&self) -> &str {
        &self.entry
    }

    pub(crate) fn tera(&self) -> std::sync::RwLockReadGuard<'_, Tera> {
        self.tera.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn dependency_names(&self) -> Vec<String> {
        lock(&self.resources)
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }
}

/// An executable template handle returned to the host.
#[derive(Debug)]
pub struct CompiledTemplate {
    id: String,
    name: Option<String>,
    strategy: CompileStrategy,
    origin: TemplateOrigin,
    options: CompileOptions,
    unit: TemplateUnit,
}

impl CompiledTemplate {
    /// Label used in logs and errors: the host name if any, else the entry name.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn strategy(&self) -> CompileStrategy {
        self.strategy
    }

    pub fn origin(&self) -> &TemplateOrigin {
        &self.origin
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Name of the entry template inside the unit (trace id or file name).
    pub fn entry(&self) -> &str {
        self.unit.entry()
    }

    /// Materialized file backing this template, if any.
    pub fn materialized_path(&self) -> Option<&Path> {
        match &self.origin {
            TemplateOrigin::Materialized(path) => Some(path),
            _ => None,
        }
    }

    /// Names of every template loaded into this unit, entry included.
    pub fn dependencies(&self) -> Vec<String> {
        self.unit.dependency_names()
    }

    pub(crate) fn unit(&self) -> &TemplateUnit {
        &self.unit
    }
}

/// Short stable id for inline sources, computed once per compile.
pub fn trace_id(source: &str) -> String {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    format!("inline-{:016x}", hasher.finish())
}

/// Compiles sources and tracks the files it materializes.
#[derive(Debug)]
pub struct TemplateCompiler {
    environment: TemplateEnvironment,
    resolver: Arc<ResourceResolver>,
    work_dir: PathBuf,
    marker: String,
    tracked: Mutex<HashSet<PathBuf>>,
}

impl TemplateCompiler {
    pub fn new(
        environment: TemplateEnvironment,
        resolver: Arc<ResourceResolver>,
        work_dir: PathBuf,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            resolver,
            work_dir,
            marker: marker.into(),
            tracked: Mutex::new(HashSet::new()),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Compile inline source text.
    pub fn compile(
        &self,
        name: Option<&str>,
        source: &str,
        options: &CompileOptions,
    ) -> StencilResult<CompiledTemplate> {
        let (detected, body) = CompileStrategy::classify(source, &self.marker);
        let strategy = CompileStrategy::from_option(options)?.unwrap_or(detected);

        let template = match strategy {
            CompileStrategy::Ephemeral => self.compile_ephemeral(name, body, options)?,
            CompileStrategy::Materialized => self.compile_materialized(name, body, options)?,
        };

        tracing::debug!(
            template = %template.id(),
            entry = %template.entry(),
            strategy = ?template.strategy(),
            "Compiled template"
        );
        Ok(template)
    }

    /// Compile a stored template by name through the loader chain.
    pub fn compile_stored(
        &self,
        name: &str,
        options: &CompileOptions,
    ) -> StencilResult<CompiledTemplate> {
        let root = self.resolver.resolve(name)?;
        let unit = self.parse_resources(name, root)?;

        tracing::debug!(template = %name, "Compiled stored template");
        Ok(CompiledTemplate {
            id: name.to_string(),
            name: Some(name.to_string()),
            strategy: CompileStrategy::Materialized,
            origin: TemplateOrigin::Stored,
            options: options.clone(),
            unit,
        })
    }

    fn compile_ephemeral(
        &self,
        name: Option<&str>,
        source: &str,
        options: &CompileOptions,
    ) -> StencilResult<CompiledTemplate> {
        let entry = trace_id(source);
        let root = Resource {
            name: entry.clone(),
            loader: INLINE_SOURCE.to_string(),
            path: PathBuf::new(),
            source: Arc::from(source),
            modified: None,
        };
        let unit = self.parse_resources(name.unwrap_or(&entry), root)?;

        Ok(CompiledTemplate {
            id: name.map_or_else(|| entry.clone(), str::to_string),
            name: name.map(str::to_string),
            strategy: CompileStrategy::Ephemeral,
            origin: TemplateOrigin::Inline,
            options: options.clone(),
            unit,
        })
    }

    fn compile_materialized(
        &self,
        name: Option<&str>,
        body: &str,
        options: &CompileOptions,
    ) -> StencilResult<CompiledTemplate> {
        let label = name.unwrap_or("<inline>");

        // Deleted on drop unless kept, so a failed compile leaves nothing behind.
        let mut file = tempfile::Builder::new()
            .prefix(MATERIALIZED_PREFIX)
            .suffix(MATERIALIZED_SUFFIX)
            .tempfile_in(&self.work_dir)
            .map_err(|e| StencilError::compile(label, format!("cannot create temp file: {e}")))?;
        file.write_all(body.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| StencilError::compile(label, format!("cannot write temp file: {e}")))?;

        let entry = file
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| StencilError::compile(label, "temp file name is not UTF-8"))?;

        let unit = match self
            .resolver
            .resolve(&entry)
            .and_then(|root| self.parse_resources(label, root))
        {
            Ok(unit) => unit,
            Err(e) => {
                self.resolver.evict(&entry);
                return Err(e);
            }
        };

        let (_, path) = file.keep().map_err(|e| {
            self.resolver.evict(&entry);
            StencilError::compile(label, format!("cannot keep temp file: {}", e.error))
        })?;
        lock(&self.tracked).insert(path.clone());

        Ok(CompiledTemplate {
            id: name.map_or_else(|| entry.clone(), str::to_string),
            name: name.map(str::to_string),
            strategy: CompileStrategy::Materialized,
            origin: TemplateOrigin::Materialized(path),
            options: options.clone(),
            unit,
        })
    }

    /// Parse `root` and everything it references into a fresh unit.
    fn parse_resources(&self, label: &str, root: Resource) -> StencilResult<TemplateUnit> {
        let entry = root.name.clone();
        let resources = self.resolver.collect(root)?;

        let mut tera = self.environment.unit();
        tera.add_raw_templates(resources.iter().map(|r| (r.name.as_str(), &*r.source)))
            .map_err(|e| StencilError::Parse {
                template: label.to_string(),
                source: e,
            })?;

        Ok(TemplateUnit {
            entry,
            tera: RwLock::new(tera),
            resources: Mutex::new(resources),
        })
    }

    /// Reload any dependency of `template` whose loader reports it changed.
    ///
    /// Failures keep the previously parsed unit in service and are logged.
    pub fn refresh(&self, template: &CompiledTemplate) {
        let unit = template.unit();
        let loaded = lock(&unit.resources).clone();
        if loaded.is_empty() {
            return;
        }

        let changed = match self.resolver.refresh(&loaded) {
            Ok(changed) if changed.is_empty() => return,
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(
                    template = %template.id(),
                    error = %e,
                    "Failed to refresh template dependencies, keeping loaded versions"
                );
                return;
            }
        };

        let mut resources = lock(&unit.resources);
        let mut tera = unit.tera.write().unwrap_or_else(std::sync::PoisonError::into_inner);

        // Apply to a copy so a broken edit never leaves a half-updated unit.
        let mut updated = tera.clone();
        if let Err(e) =
            updated.add_raw_templates(changed.iter().map(|r| (r.name.as_str(), &*r.source)))
        {
            tracing::warn!(
                template = %template.id(),
                error = %e,
                "Changed dependency failed to parse, keeping loaded versions"
            );
            return;
        }
        *tera = updated;

        for fresh in changed {
            tracing::debug!(
                template = %template.id(),
                dependency = %fresh.name,
                loader = %fresh.loader,
                "Reloaded template dependency"
            );
            match resources.iter().position(|r| r.name == fresh.name) {
                Some(i) => resources[i] = fresh,
                None => resources.push(fresh),
            }
        }
    }

    /// Delete the materialized file of `template`, if this compiler still tracks it.
    ///
    /// Never fails; deletion problems are logged.
    pub fn remove(&self, template: &CompiledTemplate) {
        let Some(path) = template.materialized_path() else {
            return;
        };
        let was_tracked = lock(&self.tracked).remove(path);
        if was_tracked {
            self.resolver.evict(template.entry());
            delete_file(path);
        }
    }

    /// Delete every tracked file. Returns how many were tracked.
    pub fn remove_all(&self) -> usize {
        let paths: Vec<PathBuf> = lock(&self.tracked).drain().collect();
        for path in &paths {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                self.resolver.evict(name);
            }
            delete_file(path);
        }
        paths.len()
    }

    /// Number of materialized files currently tracked.
    pub fn tracked_count(&self) -> usize {
        lock(&self.tracked).len()
    }
}

fn delete_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(?path, "Deleted materialized template"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "Materialized template already gone");
        }
        Err(e) => {
            tracing::warn!(?path, error = %e, "Failed to delete materialized template");
        }
    }
}
