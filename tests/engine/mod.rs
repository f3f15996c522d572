mod harness;

mod compile_test;
mod logging_test;
mod properties_test;
mod render_test;
