//! Release artefacts: archive naming, deterministic archive writers,
//! checksums and the per-target packager.
//!
//! # Sub-modules
//!
//! - [`archive`] - Deterministic `.tar.gz` and `.zip` writers.
//! - [`checksum`] - SHA-256 digests and `sha256sum` checksum files.
//! - [`naming`] - Archive naming policy (`ArtefactName`).
//! - [`packaging`] - The per-target [`packaging::Packager`].
//! - [`packaging_error`] - Error types for packaging.

pub mod archive;
pub mod checksum;
pub mod naming;
pub mod packaging;
pub mod packaging_error;

pub use checksum::{Sha256Digest, verify_checksum_file};
pub use packaging::{PackagedArtifact, Packager};
pub use packaging_error::PackagingError;
