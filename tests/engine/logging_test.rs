use serial_test::serial;
use stencil_core::logging::init_tracing;
use stencil_core::CompileOptions;

use super::harness::EngineHarness;
use crate::common::vars;

#[test]
#[serial]
fn test_engine_runs_under_installed_subscriber() {
    init_tracing("stencil_core=trace").unwrap();
    assert!(!init_tracing("stencil_core=trace").unwrap());

    let h = EngineHarness::setup();
    let template = h
        .engine
        .compile(None, "{# cache #}\nsize={{ s }}", &CompileOptions::new())
        .unwrap();
    let out = h
        .engine
        .render_to_string(&template, &vars(serde_json::json!({"s": 3})))
        .unwrap();
    assert_eq!(out, "size=3");
}
