//! # Property Store
//!
//! Hot-reloading external key/value files exposed to templates as named
//! variable namespaces.
//!
//! - [`source`] — a single file-backed source with rate-limited staleness checks
//! - [`registry`] — the fixed name → source mapping built from configuration

pub mod registry;
pub mod source;

pub use registry::PropertyRegistry;
pub use source::{parse_properties, PropertySnapshot, PropertySource};
