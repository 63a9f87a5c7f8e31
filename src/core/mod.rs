// ThreadSleuth - core/mod.rs
//
// Core business logic layer: detection, parsing, cross-referencing and the
// canonical model.
// Dependencies: util layer and pure-computation crates (regex, serde).
// Must NOT depend on: platform, app, or any filesystem access.

pub mod builder;
pub mod compare;
pub mod deadlock;
pub mod detect;
pub mod export;
pub mod grammar;
pub mod json;
pub mod model;
pub mod parser;
pub mod pool;
pub mod text;

pub use parser::{parse, parse_with};
pub use pool::pool_of;
