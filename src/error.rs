//! # Engine Error Types
//!
//! Unified error handling for compile, resolve and render operations.
//!
//! Cleanup problems (temp-file deletion, property file reload failures) are
//! never represented here: they are logged with `tracing::warn!` and swallowed
//! so filesystem hygiene issues cannot fail a request.

use thiserror::Error;

/// Engine operation result type
pub type StencilResult<T> = Result<T, StencilError>;

/// Error conditions surfaced to the host
#[derive(Debug, Error)]
pub enum StencilError {
    /// Bad or unusable settings. Fatal at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A template could not be materialized.
    #[error("Failed to compile template '{template}': {reason}")]
    Compile { template: String, reason: String },

    /// The templating engine rejected the template source.
    #[error("Failed to parse template '{template}': {source}")]
    Parse {
        template: String,
        source: tera::Error,
    },

    /// No resource loader could resolve the reference.
    #[error("Template not found: {name}")]
    NotFound { name: String },

    /// Merging a template with its bindings failed.
    #[error("Template execution failed for '{template}': {source}")]
    Execution {
        template: String,
        source: tera::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StencilError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a compile error for the given template label
    pub fn compile(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Compile {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error for an unresolvable reference
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StencilError::NotFound { .. })
    }

    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, StencilError::Config(_))
    }

    /// Whether this error happened while compiling (as opposed to rendering)
    #[must_use]
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            StencilError::Compile { .. } | StencilError::Parse { .. } | StencilError::NotFound { .. }
        )
    }
}
