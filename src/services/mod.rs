//! Service layer.
//!
//! Domain logic separated from transport concerns; used by both the CLI and
//! the HTTP server.

pub mod processing;

pub use processing::DocumentProcessor;
