use std::sync::Arc;
use std::thread;

use serde_json::json;
use stencil_core::{CompileOptions, StencilError};

use super::harness::EngineHarness;
use crate::common::vars;

#[test]
fn test_size_binding() {
    let h = EngineHarness::setup();
    let template = h
        .engine
        .compile(None, "size={{ my_size }}", &CompileOptions::new())
        .unwrap();
    let out = h
        .engine
        .render(&template, &vars(json!({"my_size": "50"})))
        .unwrap();
    assert_eq!(out, b"size=50");
}

#[test]
fn test_sequential_renders_do_not_leak_state() {
    let h = EngineHarness::setup();
    let template = h
        .engine
        .compile(
            None,
            "size={{ my_size }}{% if extra %} extra={{ extra }}{% endif %}",
            &CompileOptions::new(),
        )
        .unwrap();

    for i in 0..1000 {
        let variables = if i % 2 == 0 {
            vars(json!({"my_size": i, "extra": format!("e{i}")}))
        } else {
            vars(json!({"my_size": i, "extra": false}))
        };
        let out = h.engine.render_to_string(&template, &variables).unwrap();
        let expected = if i % 2 == 0 {
            format!("size={i} extra=e{i}")
        } else {
            format!("size={i}")
        };
        assert_eq!(out, expected);
    }
}

#[test]
fn test_caller_variable_shadows_property_namespace() {
    let h = EngineHarness::builder()
        .properties("cfg", "my_size=5\n", 60_000)
        .build();
    let template = h
        .engine
        .compile(None, "{{ cfg }}", &CompileOptions::new())
        .unwrap();

    let out = h
        .engine
        .render_to_string(&template, &vars(json!({"cfg": "caller"})))
        .unwrap();
    assert_eq!(out, "caller");
}

#[test]
fn test_property_namespace_and_functions() {
    let h = EngineHarness::builder()
        .properties(
            "cfg",
            "my_size=5\nfields.0=title\nfields.1=body\ntags.0=b\ntags.1=a\ntags.2=b\n",
            60_000,
        )
        .build();
    let template = h
        .engine
        .compile(
            None,
            concat!(
                r#"{"size": {{ cfg.my_size }}, "#,
                r#""fields": {{ prop_list(source="cfg", key="fields") | json_literal }}, "#,
                r#""tags": "{{ prop_set(source="cfg", key="tags") | join(sep=",") }}", "#,
                r#""limit": {{ prop(source="cfg", key="limit", default=100) }}}"#,
            ),
            &CompileOptions::new(),
        )
        .unwrap();

    let out = h
        .engine
        .render_to_string(&template, &vars(json!({})))
        .unwrap();
    assert_eq!(
        out,
        r#"{"size": 5, "fields": ["title","body"], "tags": "a,b", "limit": 100}"#
    );
}

#[test]
fn test_unknown_property_source_fails_render() {
    let h = EngineHarness::setup();
    let template = h
        .engine
        .compile(
            Some("bad-prop"),
            r#"{{ prop(source="missing", key="k") }}"#,
            &CompileOptions::new(),
        )
        .unwrap();
    let err = h
        .engine
        .render(&template, &vars(json!({})))
        .unwrap_err();
    assert!(matches!(err, StencilError::Execution { .. }));
}

#[test]
fn test_missing_variable_is_execution_error() {
    let h = EngineHarness::setup();
    let template = h
        .engine
        .compile(Some("sized"), "{# cache #}\nsize={{ my_size }}", &CompileOptions::new())
        .unwrap();

    let err = h
        .engine
        .render(&template, &vars(json!({})))
        .unwrap_err();
    match err {
        StencilError::Execution { template, .. } => assert_eq!(template, "sized"),
        other => panic!("expected execution error, got {other:?}"),
    }

    // The template stays usable after a failed render.
    let out = h
        .engine
        .render_to_string(&template, &vars(json!({"my_size": 1})))
        .unwrap();
    assert_eq!(out, "size=1");
}

#[test]
fn test_concurrent_renders() {
    let h = EngineHarness::setup();
    let engine = Arc::new(h.engine);
    let template = engine
        .compile(None, "{# cache #}\nid={{ id }}", &CompileOptions::new())
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let template = Arc::clone(&template);
            thread::spawn(move || {
                for i in 0..200 {
                    let id = t * 1000 + i;
                    let out = engine
                        .render_to_string(&template, &vars(json!({ "id": id })))
                        .unwrap();
                    assert_eq!(out, format!("id={id}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
