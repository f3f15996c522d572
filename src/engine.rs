//! # Script Engine
//!
//! The engine context the host talks to. Construction order is fixed:
//!
//! 1. working directory
//! 2. property registry
//! 3. resource loader chain
//! 4. Tera environment and compiler
//! 5. renderer
//!
//! Teardown ([`ScriptEngine::shutdown`], also run on drop) deletes every file
//! the engine materialized. A private working directory is removed with the
//! engine.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use crate::config::{load_engine_config, resolve_path, EngineConfig};
use crate::error::{StencilError, StencilResult};
use crate::properties::PropertyRegistry;
use crate::render::{Renderer, Variables};
use crate::resources::ResourceResolver;
use crate::template_engine::{
    CompileOptions, CompiledTemplate, TemplateCompiler, TemplateEnvironment,
};

const WORK_DIR_PREFIX: &str = "stencil-";

#[derive(Debug)]
enum WorkDir {
    /// Engine-owned directory, removed on drop.
    Private(TempDir),
    /// Directory named in configuration. Left in place.
    Configured(PathBuf),
}

impl WorkDir {
    fn create(config: &EngineConfig) -> StencilResult<Self> {
        match &config.work_dir {
            Some(dir) => {
                let dir = resolve_path(&config.config_dir, dir);
                std::fs::create_dir_all(&dir).map_err(|e| {
                    StencilError::config(format!(
                        "cannot create working directory {}: {e}",
                        dir.display()
                    ))
                })?;
                Ok(WorkDir::Configured(dir))
            }
            None => tempfile::Builder::new()
                .prefix(WORK_DIR_PREFIX)
                .tempdir()
                .map(WorkDir::Private)
                .map_err(|e| {
                    StencilError::config(format!("cannot create private working directory: {e}"))
                }),
        }
    }

    fn path(&self) -> &Path {
        match self {
            WorkDir::Private(dir) => dir.path(),
            WorkDir::Configured(dir) => dir,
        }
    }
}

/// Compiles and renders templates for a host application.
///
/// `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct ScriptEngine {
    registry: Arc<PropertyRegistry>,
    resolver: Arc<ResourceResolver>,
    compiler: Arc<TemplateCompiler>,
    renderer: Renderer,
    shut_down: AtomicBool,
    // Dropped last so tracked files are gone before the directory is removed.
    work_dir: WorkDir,
}

impl ScriptEngine {
    pub fn new(config: EngineConfig) -> StencilResult<Self> {
        let work_dir = WorkDir::create(&config)?;
        let registry = Arc::new(PropertyRegistry::from_config(
            &config.properties,
            &config.config_dir,
        ));
        let resolver = Arc::new(ResourceResolver::from_config(&config, work_dir.path())?);
        let compiler = Arc::new(TemplateCompiler::new(
            TemplateEnvironment::new(Arc::clone(&registry)),
            Arc::clone(&resolver),
            work_dir.path().to_path_buf(),
            config.engine.cache_marker.clone(),
        ));
        let renderer = Renderer::new(Arc::clone(&registry), Arc::clone(&compiler), &config.engine);

        tracing::info!(
            work_dir = %work_dir.path().display(),
            property_sources = registry.len(),
            loaders = ?resolver.loader_names(),
            "Script engine initialized"
        );

        Ok(Self {
            registry,
            resolver,
            compiler,
            renderer,
            shut_down: AtomicBool::new(false),
            work_dir,
        })
    }

    /// Build an engine from a TOML settings file.
    pub fn from_config_file(path: &Path) -> StencilResult<Self> {
        Self::new(load_engine_config(path)?)
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    /// Compile inline source. A marker first line selects materialization.
    pub fn compile(
        &self,
        name: Option<&str>,
        source: &str,
        options: &CompileOptions,
    ) -> StencilResult<Arc<CompiledTemplate>> {
        self.compiler.compile(name, source, options).map(Arc::new)
    }

    /// Compile a stored template resolved by name through the loader chain.
    pub fn compile_stored(
        &self,
        name: &str,
        options: &CompileOptions,
    ) -> StencilResult<Arc<CompiledTemplate>> {
        self.compiler.compile_stored(name, options).map(Arc::new)
    }

    pub fn render(
        &self,
        template: &CompiledTemplate,
        variables: &Variables,
    ) -> StencilResult<Vec<u8>> {
        self.renderer.render(template, variables)
    }

    pub fn render_to_string(
        &self,
        template: &CompiledTemplate,
        variables: &Variables,
    ) -> StencilResult<String> {
        self.renderer.render_to_string(template, variables)
    }

    /// The host removed `template`; delete anything it materialized.
    pub fn notify_removed(&self, template: &CompiledTemplate) {
        tracing::debug!(template = %template.id(), "Template removed");
        self.compiler.remove(template);
    }

    /// Number of materialized files still on disk.
    pub fn materialized_count(&self) -> usize {
        self.compiler.tracked_count()
    }

    /// Delete every materialized file. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let removed = self.compiler.remove_all();
        self.renderer.buffers().clear();
        tracing::info!(removed, "Script engine shut down");
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
