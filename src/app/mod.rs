// ThreadSleuth - app/mod.rs
//
// Application layer: file loading, derived summaries and user marks.
// Dependencies: core layer, platform filesystem helpers.

pub mod load;
pub mod marks;
pub mod summary;
