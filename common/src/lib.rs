//! Shared Shipwright model: targets, the target matrix, release tags and
//! configuration loading.
//!
//! # Modules
//!
//! - [`config`] - `shipwright.toml` discovery, parsing and validation
//! - [`error`] - Configuration error types
//! - [`matrix`] - The validated, immutable target matrix
//! - [`scaffold`] - Starter configuration for `shipwright init`
//! - [`tag`] - Release tag parsing
//! - [`target`] - Target triples, archive formats and target descriptions

pub mod config;
pub mod error;
pub mod matrix;
pub mod scaffold;
pub mod tag;
pub mod target;

pub use config::Config;
pub use error::ConfigError;
pub use matrix::TargetMatrix;
pub use tag::ReleaseTag;
pub use target::{ArchiveFormat, TargetSpec, TargetTriple};
