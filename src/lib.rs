//! Template compilation, caching and rendering for host applications that
//! render small JSON query bodies from named scripts.
//!
//! The host builds one [`ScriptEngine`], compiles sources once and renders them
//! repeatedly against per-request variables.
//!
//! # Modules
//!
//! - [`config`] — TOML engine settings
//! - [`engine`] — the engine context tying everything together
//! - [`error`] — [`StencilError`] and [`StencilResult`]
//! - [`logging`] — optional `tracing` subscriber setup
//! - [`properties`] — hot-reloading `.properties` files exposed to templates
//! - [`render`] — context merging and pooled output buffers
//! - [`resources`] — the template loader chain
//! - [`template_engine`] — ephemeral and materialized compilation on Tera

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod properties;
pub mod render;
pub mod resources;
pub mod template_engine;

pub use config::EngineConfig;
pub use engine::ScriptEngine;
pub use error::{StencilError, StencilResult};
pub use render::Variables;
pub use template_engine::{CompileOptions, CompileStrategy, CompiledTemplate, TemplateOrigin};
