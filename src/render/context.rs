//! Per-render variable bindings.

use serde_json::{Map, Value};
use tera::Context;

use crate::properties::PropertyRegistry;

/// Caller-supplied bindings for one render call.
pub type Variables = Map<String, Value>;

/// Build the Tera context for one render.
///
/// Every property source is bound under its logical name as an object of its
/// current values; caller variables are inserted afterwards and win on a name
/// collision.
pub fn build_context(registry: &PropertyRegistry, variables: &Variables) -> Context {
    let mut context = Context::new();
    for (name, source) in registry.snapshot() {
        context.insert(name.as_str(), source.snapshot().as_value());
    }
    for (name, value) in variables {
        context.insert(name.as_str(), value);
    }
    context
}
