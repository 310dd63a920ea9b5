//! Execution and evaluation harness for third-party zero-knowledge circuit
//! analyzers.
//!
//! The pipeline runs in stages: the [`registry`] resolves tool names to
//! [`adapters`], the [`engine`] executes invocations with hard timeouts, the
//! adapter parses raw output into normalized findings, the [`evaluate`]
//! module scores findings against ground truth, and the [`aggregate`] module
//! collects rows and persists the run tree. The [`batch`] module wires all
//! of it together behind a worker pool.

pub mod adapters;
pub mod aggregate;
pub mod batch;
pub mod engine;
pub mod evaluate;
pub mod ground_truth;
pub mod model;
pub mod prepare;
pub mod registry;

pub use model::Dsl;

/// Crate version, surfaced by the CLI.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
