//! Decision logic applied to extraction results.

pub mod evaluator;

pub use evaluator::{evaluate, surfaced_value};
