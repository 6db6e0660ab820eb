//! Shared test utilities for designflow integration tests.
//!
//! - `TestHarness` wires a store, asset directory and pipeline in a temp dir
//! - `ConfigBuilder` creates configs programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
