//! # Resource Resolution
//!
//! Turns template references into source text through an ordered chain of
//! named loaders, each with independent caching and staleness policy.
//!
//! - [`loader`] — the [`ResourceLoader`] trait and the directory-backed loader
//! - [`resolver`] — the fixed-order chain and include/import dependency collection

pub mod loader;
pub mod resolver;

pub use loader::{CheckInterval, FileResourceLoader, Resource, ResourceLoader};
pub use resolver::{
    references, ResourceResolver, TemplateReference, EPHEMERAL_LOADER, SCRIPTS_LOADER,
};
