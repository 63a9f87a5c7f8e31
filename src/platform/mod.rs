// ThreadSleuth - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: standard library, directories crate, core option types.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
