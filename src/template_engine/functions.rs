//! Tera functions exposing the property registry's accessors to templates.
//!
//! ```text
//! {{ prop(source="cfg", key="my_size", default="10") }}
//! {% for field in prop_list(source="cfg", key="fields") %}...{% endfor %}
//! {{ prop_set(source="cfg", key="tags") | join(sep=",") }}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tera::{Function, Result, Value};

use crate::properties::{PropertyRegistry, PropertySource};

fn string_arg<'a>(args: &'a HashMap<String, Value>, fn_name: &str, arg: &str) -> Result<&'a str> {
    args.get(arg).and_then(Value::as_str).ok_or_else(|| {
        tera::Error::msg(format!("{fn_name} expects a string `{arg}` argument"))
    })
}

fn lookup<'a>(
    registry: &'a PropertyRegistry,
    args: &HashMap<String, Value>,
    fn_name: &str,
) -> Result<&'a Arc<PropertySource>> {
    let name = string_arg(args, fn_name, "source")?;
    registry
        .get(name)
        .ok_or_else(|| tera::Error::msg(format!("{fn_name}: unknown property source '{name}'")))
}

/// `prop(source, key, default?)`: a single value, `default` or null when absent.
pub(crate) fn prop(registry: Arc<PropertyRegistry>) -> impl Function {
    move |args: &HashMap<String, Value>| -> Result<Value> {
        let source = lookup(&registry, args, "prop")?;
        let key = string_arg(args, "prop", "key")?;
        Ok(match source.get(key) {
            Some(value) => Value::String(value),
            None => args.get("default").cloned().unwrap_or(Value::Null),
        })
    }
}

/// `prop_list(source, key)`: values of `key.0`, `key.1`, ... in order.
pub(crate) fn prop_list(registry: Arc<PropertyRegistry>) -> impl Function {
    move |args: &HashMap<String, Value>| -> Result<Value> {
        let source = lookup(&registry, args, "prop_list")?;
        let key = string_arg(args, "prop_list", "key")?;
        Ok(Value::Array(
            source
                .get_list(key)
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ))
    }
}

/// `prop_set(source, key)`: distinct values under the numbered-key convention.
pub(crate) fn prop_set(registry: Arc<PropertyRegistry>) -> impl Function {
    move |args: &HashMap<String, Value>| -> Result<Value> {
        let source = lookup(&registry, args, "prop_set")?;
        let key = string_arg(args, "prop_set", "key")?;
        Ok(Value::Array(
            source
                .get_set(key)
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ))
    }
}
