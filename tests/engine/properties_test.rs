use std::fs;

use serde_json::json;
use stencil_core::config::PropertyFileConfig;
use stencil_core::CompileOptions;

use super::harness::EngineHarness;
use crate::common::{rewrite, vars};

#[test]
fn test_zero_interval_reloads_on_next_render() {
    let h = EngineHarness::builder()
        .properties("cfg", "my_size=5\n", 0)
        .build();
    let template = h
        .engine
        .compile(None, "size={{ cfg.my_size }}", &CompileOptions::new())
        .unwrap();
    let render = || {
        h.engine
            .render_to_string(&template, &vars(json!({})))
            .unwrap()
    };
    assert_eq!(render(), "size=5");

    rewrite(&h.config_dir.join("cfg.properties"), "my_size=9\n");
    assert_eq!(
        h.engine.properties().get("cfg").unwrap().get("my_size").as_deref(),
        Some("9")
    );
    assert_eq!(render(), "size=9");
}

#[test]
fn test_long_interval_serves_old_values() {
    let h = EngineHarness::builder()
        .properties("cfg", "my_size=5\n", 3_600_000)
        .build();
    let source = h.engine.properties().get("cfg").unwrap();
    assert_eq!(source.get("my_size").as_deref(), Some("5"));

    rewrite(&h.config_dir.join("cfg.properties"), "my_size=9\n");
    assert!(!source.is_stale());
    assert_eq!(source.get("my_size").as_deref(), Some("5"));

    // An explicit reload always picks the file up.
    source.reload();
    assert_eq!(source.get("my_size").as_deref(), Some("9"));
}

#[test]
fn test_vanished_file_keeps_last_snapshot() {
    let h = EngineHarness::builder()
        .properties("cfg", "my_size=5\n", 0)
        .build();
    let template = h
        .engine
        .compile(None, "size={{ cfg.my_size }}", &CompileOptions::new())
        .unwrap();

    fs::remove_file(h.config_dir.join("cfg.properties")).unwrap();
    let out = h
        .engine
        .render_to_string(&template, &vars(json!({})))
        .unwrap();
    assert_eq!(out, "size=5");
}

#[test]
fn test_missing_declared_file_is_skipped() {
    let h = EngineHarness::builder()
        .properties("cfg", "my_size=5\n", 0)
        .configure(|config| {
            config
                .properties
                .files
                .push(PropertyFileConfig::new("absent", "absent.properties"));
        })
        .build();

    let names: Vec<&str> = h.engine.properties().names().collect();
    assert_eq!(names, vec!["cfg"]);
}

#[test]
fn test_list_and_set_follow_reload() {
    let h = EngineHarness::builder()
        .properties("cfg", "k.0=a\nk.1=b\nk.2=c\nk.4=e\n", 0)
        .build();
    let source = h.engine.properties().get("cfg").unwrap();
    assert_eq!(*source.get_list("k"), vec!["a", "b", "c"]);
    assert_eq!(
        source.get_set("k").iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );

    rewrite(&h.config_dir.join("cfg.properties"), "k.0=z\nk.1=z\n");
    assert_eq!(*source.get_list("k"), vec!["z", "z"]);
    assert_eq!(source.get_set("k").len(), 1);
}
