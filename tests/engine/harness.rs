//! Scratch layout plus a live engine for integration tests.
//!
//! ```text
//! <root>/config/                 config-dir
//! <root>/config/scripts/         stored templates
//! <root>/config/*.properties     property files
//! <root>/work/                   materialized templates
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use stencil_core::config::PropertyFileConfig;
use stencil_core::{EngineConfig, ScriptEngine};
use tempfile::TempDir;

pub struct EngineHarness {
    pub engine: ScriptEngine,
    pub config_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub work_dir: PathBuf,
    pub root: TempDir,
}

/// Builder for the scratch layout; files are written before the engine starts.
pub struct HarnessBuilder {
    root: TempDir,
    config: EngineConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let config_dir = root.path().join("config");
        fs::create_dir_all(config_dir.join("scripts")).unwrap();

        let mut config = EngineConfig::with_config_dir(&config_dir);
        config.work_dir = Some(root.path().join("work"));
        Self { root, config }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config.config_dir
    }

    /// Write a property file and declare it under `name`.
    pub fn properties(mut self, name: &str, contents: &str, reload_interval_ms: u64) -> Self {
        let file = format!("{name}.properties");
        fs::write(self.config.config_dir.join(&file), contents).unwrap();
        let mut declared = PropertyFileConfig::new(name, file);
        declared.reload_interval_ms = Some(reload_interval_ms);
        self.config.properties.files.push(declared);
        self
    }

    pub fn script(self, name: &str, contents: &str) -> Self {
        let path = self.config.scripts_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn build(self) -> EngineHarness {
        let scripts_dir = self.config.scripts_dir();
        let config_dir = self.config.config_dir.clone();
        let engine = ScriptEngine::new(self.config).unwrap();
        EngineHarness {
            work_dir: engine.work_dir().to_path_buf(),
            engine,
            config_dir,
            scripts_dir,
            root: self.root,
        }
    }
}

impl EngineHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    pub fn setup() -> Self {
        Self::builder().build()
    }
}
