// ThreadSleuth - lib.rs
//
// Library entry point, exposing the parsing engine and its supporting layers
// for the CLI binary, integration tests and programmatic use.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
