//! # Render Path
//!
//! Merges a compiled template with request bindings into UTF-8 output.
//!
//! Output is written into a buffer on loan from a [`BufferPool`]; the buffer
//! goes back to the pool when the render returns, on success or failure.
//! Dependencies loaded from external loaders are refreshed before each merge.

mod buffer_pool;
mod context;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use context::{build_context, Variables};

use std::sync::Arc;

use tracing::Level;

use crate::config::EngineOptions;
use crate::error::{StencilError, StencilResult};
use crate::properties::PropertyRegistry;
use crate::template_engine::{CompiledTemplate, TemplateCompiler};

#[derive(Debug)]
pub struct Renderer {
    registry: Arc<PropertyRegistry>,
    compiler: Arc<TemplateCompiler>,
    buffers: BufferPool,
}

impl Renderer {
    pub fn new(
        registry: Arc<PropertyRegistry>,
        compiler: Arc<TemplateCompiler>,
        options: &EngineOptions,
    ) -> Self {
        let buffers = BufferPool::new(
            options.buffer_pool_size,
            options.buffer_capacity,
            options.max_retained_buffer,
        );
        buffers.warm(options.buffer_pool_size);
        Self {
            registry,
            compiler,
            buffers,
        }
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    /// Render `template` against `variables`, returning the output bytes.
    pub fn render(
        &self,
        template: &CompiledTemplate,
        variables: &Variables,
    ) -> StencilResult<Vec<u8>> {
        self.compiler.refresh(template);

        let context = build_context(&self.registry, variables);
        let mut buffer = self.buffers.get();
        {
            let unit = template.unit();
            let tera = unit.tera();
            tera.render_to(unit.entry(), &context, &mut *buffer)
                .map_err(|e| StencilError::Execution {
                    template: template.id().to_string(),
                    source: e,
                })?;
        }

        if tracing::enabled!(Level::TRACE) {
            tracing::trace!(
                template = %template.id(),
                output = %String::from_utf8_lossy(&buffer),
                "Rendered template"
            );
        }
        Ok(buffer.to_vec())
    }

    /// [`Self::render`] returning text.
    pub fn render_to_string(
        &self,
        template: &CompiledTemplate,
        variables: &Variables,
    ) -> StencilResult<String> {
        let bytes = self.render(template, variables)?;
        String::from_utf8(bytes).map_err(|e| StencilError::Execution {
            template: template.id().to_string(),
            source: tera::Error::msg(format!("output is not valid UTF-8: {e}")),
        })
    }
}
