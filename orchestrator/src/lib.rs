//! Shipwright orchestrator library.
//!
//! This crate builds a project for every target in its matrix, packages each
//! binary into a checksummed archive, and publishes the whole set as one
//! release. It is used by the `shipwright` CLI binary and can be driven
//! programmatically with custom [`builder::BuildStep`] and
//! [`publish::Publisher`] implementations.
//!
//! # Modules
//!
//! - [`artefact`] - Deterministic archives, naming and SHA-256 checksums
//! - [`builder`] - Per-target toolchain invocation with timeouts
//! - [`bundle`] - The immutable set of artefacts handed to a publisher
//! - [`ci`] - The CI check over the whole matrix
//! - [`cli`] - Command-line argument definitions
//! - [`error`] - CLI error types and exit codes
//! - [`list_output`] - Output formatting for the configured matrix
//! - [`logging`] - Stderr logger for the binary
//! - [`pipeline`] - Bounded fan-out/fan-in engine shared by both entry points
//! - [`publish`] - Publishers and release notes
//! - [`release`] - The all-or-nothing release procedure
//! - [`report`] - Final run reports in text or JSON
//! - [`trigger`] - Mapping pushed refs to CI or release runs

pub mod artefact;
pub mod builder;
pub mod bundle;
pub mod ci;
pub mod cli;
pub mod error;
pub mod list_output;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod release;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod trigger;
