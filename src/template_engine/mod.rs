//! Template compilation on top of Tera.
//!
//! Sources are compiled either straight from memory or through a materialized
//! file in the engine's working directory. Every compiled template owns its own
//! Tera unit, stamped with the JSON filters and property functions.

mod compiler;
mod environment;
mod filters;
mod functions;

pub use compiler::{
    trace_id, CompileOptions, CompileStrategy, CompiledTemplate, TemplateCompiler, TemplateOrigin,
    STRATEGY_OPTION,
};
pub use environment::TemplateEnvironment;
