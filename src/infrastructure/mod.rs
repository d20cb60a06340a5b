//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Built-in sinks (terminal, file, callback, tracing)
//! - In-memory message catalogs
//! - Operating system glue (error texts, process exit)
//! - Tracing integration (Layer trait)

pub mod catalog;
pub mod layer;
pub mod os;
pub mod sinks;
pub(crate) mod visitor;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for sinks,
/// translators, process exit and `tracing` output.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// report-dispatch = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
