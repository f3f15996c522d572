//! Shared templating-engine configuration.
//!
//! Every parsed template lives in its own Tera unit so that dropping a template
//! frees everything it loaded. The environment stamps each new unit with the
//! same filters, functions and escaping policy.

use std::sync::Arc;

use tera::Tera;

use super::{filters, functions};
use crate::properties::PropertyRegistry;

#[derive(Debug, Clone)]
pub struct TemplateEnvironment {
    registry: Arc<PropertyRegistry>,
}

impl TemplateEnvironment {
    pub fn new(registry: Arc<PropertyRegistry>) -> Self {
        Self { registry }
    }

    /// A fresh, empty Tera unit with engine filters and functions registered.
    pub fn unit(&self) -> Tera {
        let mut tera = Tera::default();
        // Output is JSON, never HTML.
        tera.autoescape_on(Vec::new());

        tera.register_filter("json_escape", filters::json_escape);
        tera.register_filter("json_literal", filters::json_literal);

        tera.register_function("prop", functions::prop(Arc::clone(&self.registry)));
        tera.register_function("prop_list", functions::prop_list(Arc::clone(&self.registry)));
        tera.register_function("prop_set", functions::prop_set(Arc::clone(&self.registry)));

        tera
    }
}
