use serde_json::json;
use stencil_core::{CompileOptions, CompileStrategy, StencilError, TemplateOrigin};

use super::harness::EngineHarness;
use crate::common::{files_in, vars};

#[test]
fn test_inline_source_compiles_without_files() {
    let h = EngineHarness::setup();
    let source = r#"{"query": {"match": {"title": "{{ q | json_escape }}"}}, "size": {{ size }}}"#;

    let first = h.engine.compile(None, source, &CompileOptions::new()).unwrap();
    let second = h.engine.compile(None, source, &CompileOptions::new()).unwrap();
    assert_eq!(first.strategy(), CompileStrategy::Ephemeral);
    assert_eq!(first.entry(), second.entry());
    assert!(files_in(&h.work_dir).is_empty());

    let variables = vars(json!({"q": "rust \"tera\"", "size": 10}));
    let a = h.engine.render(&first, &variables).unwrap();
    let b = h.engine.render(&second, &variables).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        String::from_utf8(a).unwrap(),
        r#"{"query": {"match": {"title": "rust \"tera\""}}, "size": 10}"#
    );
    assert!(files_in(&h.work_dir).is_empty());
}

#[test]
fn test_marker_source_materializes_one_file() {
    let h = EngineHarness::setup();
    let before = files_in(&h.work_dir);

    let template = h
        .engine
        .compile(
            Some("by-size"),
            "{# cache #}\nsize={{ my_size }}",
            &CompileOptions::new(),
        )
        .unwrap();
    let after = files_in(&h.work_dir);
    assert_eq!(after.len(), before.len() + 1);

    let path = template.materialized_path().unwrap().to_path_buf();
    assert!(after.contains(&path));
    let file_name = path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.starts_with("tmpl-"));
    assert!(file_name.ends_with(".tera"));
    assert!(matches!(template.origin(), TemplateOrigin::Materialized(_)));

    let out = h
        .engine
        .render_to_string(&template, &vars(json!({"my_size": "50"})))
        .unwrap();
    assert_eq!(out, "size=50");

    h.engine.notify_removed(&template);
    assert_eq!(files_in(&h.work_dir), before);
}

#[test]
fn test_removal_deletes_only_that_file() {
    let h = EngineHarness::setup();
    let keep = h
        .engine
        .compile(None, "{# cache #}\nkeep", &CompileOptions::new())
        .unwrap();
    let drop_me = h
        .engine
        .compile(None, "{# cache #}\ndrop", &CompileOptions::new())
        .unwrap();
    assert_eq!(files_in(&h.work_dir).len(), 2);

    h.engine.notify_removed(&drop_me);
    assert_eq!(
        files_in(&h.work_dir),
        vec![keep.materialized_path().unwrap().to_path_buf()]
    );
    assert_eq!(h.engine.materialized_count(), 1);
}

#[test]
fn test_materialized_template_uses_stored_macros() {
    let h = EngineHarness::builder()
        .script(
            "macros.tera",
            r#"{% macro term(field, value) %}{"term": {"{{ field }}": {{ value | json_literal }}}}{% endmacro term %}"#,
        )
        .build();

    let template = h
        .engine
        .compile(
            None,
            "{# cache #}\n{% import \"macros.tera\" as q %}{\"query\": {{ q::term(field=\"color\", value=color) }}}",
            &CompileOptions::new(),
        )
        .unwrap();

    let out = h
        .engine
        .render_to_string(&template, &vars(json!({"color": "red"})))
        .unwrap();
    assert_eq!(out, r#"{"query": {"term": {"color": "red"}}}"#);
}

#[test]
fn test_missing_stored_template_is_not_found() {
    let h = EngineHarness::setup();
    let err = h
        .engine
        .compile_stored("nope.tera", &CompileOptions::new())
        .unwrap_err();
    assert!(matches!(err, StencilError::NotFound { ref name } if name == "nope.tera"));

    let err = h
        .engine
        .compile(
            None,
            "{# cache #}\n{% include \"nope.tera\" %}",
            &CompileOptions::new(),
        )
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(files_in(&h.work_dir).is_empty());
}

#[test]
fn test_optional_include_may_be_missing() {
    let h = EngineHarness::setup();
    let template = h
        .engine
        .compile(
            None,
            "{# cache #}\nbefore{% include \"nope.tera\" ignore missing %}after",
            &CompileOptions::new(),
        )
        .unwrap();
    assert_eq!(
        h.engine
            .render_to_string(&template, &vars(json!({})))
            .unwrap(),
        "beforeafter"
    );
}

#[test]
fn test_inline_missing_include_is_not_found() {
    let h = EngineHarness::setup();
    let err = h
        .engine
        .compile(
            None,
            "before{% include \"missing.tera\" %}after",
            &CompileOptions::new(),
        )
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, StencilError::NotFound { ref name } if name == "missing.tera"));
    assert!(files_in(&h.work_dir).is_empty());
}

#[test]
fn test_inline_include_of_stored_template() {
    let h = EngineHarness::builder()
        .script("part.tera", r#""size": {{ size }}"#)
        .build();

    let template = h
        .engine
        .compile(
            Some("inline-part"),
            "{ {% include \"part.tera\" %} }",
            &CompileOptions::new(),
        )
        .unwrap();
    assert_eq!(template.strategy(), CompileStrategy::Ephemeral);
    assert!(files_in(&h.work_dir).is_empty());

    let out = h
        .engine
        .render_to_string(&template, &vars(json!({"size": 10})))
        .unwrap();
    assert_eq!(out, r#"{ "size": 10 }"#);
}

#[test]
fn test_inline_include_list_takes_first_stored_template() {
    let h = EngineHarness::builder()
        .script("fallback.tera", "fallback")
        .build();

    let template = h
        .engine
        .compile(
            None,
            "[{% include [\"custom.tera\", \"fallback.tera\"] %}]",
            &CompileOptions::new(),
        )
        .unwrap();
    let out = h
        .engine
        .render_to_string(&template, &vars(json!({})))
        .unwrap();
    assert_eq!(out, "[fallback]");
}

#[test]
fn test_commented_and_raw_references_are_not_loaded() {
    let h = EngineHarness::setup();

    let commented = h
        .engine
        .compile(
            None,
            "{# cache #}\n{# {% include \"old.tera\" %} #}ok",
            &CompileOptions::new(),
        )
        .unwrap();
    assert_eq!(
        h.engine
            .render_to_string(&commented, &vars(json!({})))
            .unwrap(),
        "ok"
    );

    let raw = h
        .engine
        .compile(
            None,
            "{% raw %}{% include \"old.tera\" %}{% endraw %}",
            &CompileOptions::new(),
        )
        .unwrap();
    assert_eq!(
        h.engine.render_to_string(&raw, &vars(json!({}))).unwrap(),
        r#"{% include "old.tera" %}"#
    );
}

#[test]
fn test_stored_template_with_parent() {
    let h = EngineHarness::builder()
        .script(
            "base.tera",
            r#"{"query": {% block query %}{"match_all": {}}{% endblock query %}}"#,
        )
        .script(
            "by_title.tera",
            r#"{% extends "base.tera" %}{% block query %}{"match": {"title": "{{ title | json_escape }}"}}{% endblock query %}"#,
        )
        .build();

    let template = h
        .engine
        .compile_stored("by_title.tera", &CompileOptions::new())
        .unwrap();
    assert_eq!(template.origin(), &TemplateOrigin::Stored);
    let mut deps = template.dependencies();
    deps.sort();
    assert_eq!(deps, vec!["base.tera", "by_title.tera"]);

    let out = h
        .engine
        .render_to_string(&template, &vars(json!({"title": "dune"})))
        .unwrap();
    assert_eq!(out, r#"{"query": {"match": {"title": "dune"}}}"#);
}

#[test]
fn test_custom_cache_marker() {
    let h = EngineHarness::builder()
        .configure(|config| config.engine.cache_marker = "{# materialize #}".to_string())
        .build();

    let inline = h
        .engine
        .compile(None, "{# cache #}\nx", &CompileOptions::new())
        .unwrap();
    assert_eq!(inline.strategy(), CompileStrategy::Ephemeral);

    let materialized = h
        .engine
        .compile(None, "{# materialize #}\nx", &CompileOptions::new())
        .unwrap();
    assert_eq!(materialized.strategy(), CompileStrategy::Materialized);
    assert_eq!(files_in(&h.work_dir).len(), 1);
}

#[test]
fn test_parse_failure_is_compile_time_error() {
    let h = EngineHarness::setup();
    for source in ["{% if %}", "{# cache #}\n{% for x in %}"] {
        let err = h
            .engine
            .compile(Some("broken"), source, &CompileOptions::new())
            .unwrap_err();
        assert!(err.is_compile_time(), "{err}");
    }
    assert!(files_in(&h.work_dir).is_empty());
    assert_eq!(h.engine.materialized_count(), 0);
}
