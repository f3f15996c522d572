//! Tracing subscriber setup for hosts without their own.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::error::{StencilError, StencilResult};

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` plus `default_directive`.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case the existing one is left alone.
pub fn init_tracing(default_directive: &str) -> StencilResult<bool> {
    let directive = default_directive.parse::<Directive>().map_err(|e| {
        StencilError::config(format!("invalid log directive '{default_directive}': {e}"))
    })?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    Ok(installed)
}
