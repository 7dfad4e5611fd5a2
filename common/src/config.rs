//! `shipwright.toml` loading and validation.
//!
//! The file is parsed into raw serde structs, then validated into a
//! [`Config`] whose paths are absolute and whose target matrix has passed
//! every matrix rule. Relative paths resolve against the directory holding
//! the configuration file.

use crate::error::{ConfigError, Result};
use crate::matrix::TargetMatrix;
use crate::tag::DEFAULT_TAG_PREFIX;
use crate::target::{ArchiveFormat, TargetSpec, TargetTriple};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;

/// File name looked up when `--config` points at a directory.
pub const CONFIG_FILE_NAME: &str = "shipwright.toml";

/// Default per-target build timeout (30 minutes).
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Default GitHub REST endpoint.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Project identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    /// Project name, used as the archive name prefix.
    pub name: String,
    /// Name of the executable the build produces.
    pub binary: String,
}

/// How the external toolchain is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Program to run (default `cargo`).
    pub command: String,
    /// Arguments placed before `--target <triple>`.
    pub args: Vec<String>,
    /// Profile directory the binary lands in (default `release`).
    pub profile: String,
    /// Root of the per-target build directories.
    pub build_dir: Utf8PathBuf,
    /// Hard wall-clock limit for one target's build.
    pub timeout: Duration,
    /// Optional limit for the whole run.
    pub run_timeout: Option<Duration>,
    /// Worker count; `None` uses the available parallelism.
    pub jobs: Option<NonZeroUsize>,
}

/// Archive output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSettings {
    /// Directory receiving archives and checksum files.
    pub output_dir: Utf8PathBuf,
    /// Files bundled into every target's archive.
    pub extra_files: Vec<Utf8PathBuf>,
}

/// Rules deciding which pushes start a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSettings {
    /// Branches whose pushes never start a CI run.
    pub exclude_branches: Vec<String>,
    /// Prefix preceding the semantic version in release tags.
    pub tag_prefix: String,
}

/// Where releases are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishSink {
    /// Copy releases into `<root>/<tag>` on the local filesystem.
    Directory {
        /// Directory holding one sub-directory per release.
        root: Utf8PathBuf,
    },
    /// Publish a GitHub release.
    GitHub {
        /// Repository in `owner/name` form.
        repository: String,
        /// REST API base URL.
        api_url: String,
    },
}

/// Publication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    /// The configured sink.
    pub sink: PublishSink,
    /// Optional file whose contents become the release notes.
    pub notes_file: Option<Utf8PathBuf>,
}

/// A fully validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Absolute path of the configuration file.
    pub path: Utf8PathBuf,
    /// Directory holding the configuration file; the default source root.
    pub root: Utf8PathBuf,
    /// Project identity.
    pub project: ProjectSettings,
    /// Toolchain invocation.
    pub build: BuildSettings,
    /// Archive output.
    pub package: PackageSettings,
    /// Trigger rules.
    pub triggers: TriggerSettings,
    /// Publication.
    pub publish: PublishSettings,
    /// The target matrix.
    pub matrix: TargetMatrix,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    project: RawProject,
    #[serde(default)]
    build: RawBuild,
    #[serde(default)]
    package: RawPackage,
    #[serde(default)]
    triggers: RawTriggers,
    #[serde(default)]
    publish: RawPublish,
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: String,
    binary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBuild {
    command: Option<String>,
    args: Option<Vec<String>>,
    profile: Option<String>,
    build_dir: Option<Utf8PathBuf>,
    timeout_secs: Option<u64>,
    run_timeout_secs: Option<u64>,
    jobs: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    extra_files: Vec<Utf8PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTriggers {
    #[serde(default)]
    exclude_branches: Vec<String>,
    tag_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPublish {
    sink: Option<String>,
    directory: Option<Utf8PathBuf>,
    repository: Option<String>,
    api_url: Option<String>,
    notes_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    name: String,
    triple: String,
    archive: Option<String>,
    #[serde(default)]
    extra_files: Vec<Utf8PathBuf>,
}

/// Resolve the configuration file from a file or directory path.
///
/// A directory resolves to `<dir>/shipwright.toml`. The result is
/// canonicalised.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if the path or the resolved file does
/// not exist.
pub fn resolve_config_path(entry: &Utf8Path) -> Result<Utf8PathBuf> {
    let canonical = entry
        .canonicalize_utf8()
        .map_err(|_| ConfigError::NotFound {
            path: entry.to_owned(),
        })?;

    let path = if canonical.is_dir() {
        canonical.join(CONFIG_FILE_NAME)
    } else {
        canonical
    };

    if path.is_file() {
        Ok(path)
    } else {
        Err(ConfigError::NotFound { path })
    }
}

impl Config {
    /// Read and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or any
    /// validation error from [`Config::parse`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        debug!("loading configuration from {path}");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse and validate configuration text that lives at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// the matrix, trigger and publish validation errors otherwise.
    pub fn parse(contents: &str, path: &Utf8Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;

        let root = path
            .parent()
            .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_owned);
        let resolve = |p: &Utf8Path| resolve_relative(&root, p);

        let project = ProjectSettings {
            binary: raw
                .project
                .binary
                .unwrap_or_else(|| raw.project.name.clone()),
            name: raw.project.name,
        };
        let build = build_settings(raw.build, &root)?;
        let package = PackageSettings {
            output_dir: resolve(
                raw.package
                    .output_dir
                    .as_deref()
                    .unwrap_or_else(|| Utf8Path::new("dist")),
            ),
            extra_files: raw.package.extra_files.iter().map(|p| resolve(p)).collect(),
        };
        let triggers = TriggerSettings {
            exclude_branches: raw.triggers.exclude_branches,
            tag_prefix: raw
                .triggers
                .tag_prefix
                .unwrap_or_else(|| DEFAULT_TAG_PREFIX.to_owned()),
        };
        let publish = publish_settings(raw.publish, &root)?;
        let matrix = build_matrix(raw.targets, &root)?;

        Ok(Self {
            path: path.to_owned(),
            root,
            project,
            build,
            package,
            triggers,
            publish,
            matrix,
        })
    }

    /// Every extra file packaged with `target`: project-wide files first,
    /// then the target's own.
    #[must_use]
    pub fn extra_files_for(&self, target: &TargetSpec) -> Vec<Utf8PathBuf> {
        self.package
            .extra_files
            .iter()
            .chain(target.extra_files())
            .cloned()
            .collect()
    }
}

fn build_settings(raw: RawBuild, root: &Utf8Path) -> Result<BuildSettings> {
    let timeout = match raw.timeout_secs {
        Some(0) => return Err(ConfigError::ZeroValue { field: "build.timeout_secs" }),
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_BUILD_TIMEOUT,
    };
    let run_timeout = match raw.run_timeout_secs {
        Some(0) => {
            return Err(ConfigError::ZeroValue {
                field: "build.run_timeout_secs",
            });
        }
        other => other.map(Duration::from_secs),
    };
    let jobs = match raw.jobs {
        Some(n) => Some(NonZeroUsize::new(n).ok_or(ConfigError::ZeroValue { field: "build.jobs" })?),
        None => None,
    };

    Ok(BuildSettings {
        command: raw.command.unwrap_or_else(|| "cargo".to_owned()),
        args: raw
            .args
            .unwrap_or_else(|| vec!["build".to_owned(), "--release".to_owned()]),
        profile: raw.profile.unwrap_or_else(|| "release".to_owned()),
        build_dir: resolve_relative(
            root,
            raw.build_dir
                .as_deref()
                .unwrap_or_else(|| Utf8Path::new("target/shipwright")),
        ),
        timeout,
        run_timeout,
        jobs,
    })
}

fn publish_settings(raw: RawPublish, root: &Utf8Path) -> Result<PublishSettings> {
    let sink = match raw.sink.as_deref().unwrap_or("directory") {
        "directory" => PublishSink::Directory {
            root: resolve_relative(
                root,
                raw.directory
                    .as_deref()
                    .unwrap_or_else(|| Utf8Path::new("releases")),
            ),
        },
        "github" => PublishSink::GitHub {
            repository: raw.repository.ok_or(ConfigError::MissingPublishSetting {
                sink: "github",
                field: "repository",
            })?,
            api_url: raw
                .api_url
                .unwrap_or_else(|| DEFAULT_GITHUB_API.to_owned()),
        },
        other => {
            return Err(ConfigError::UnknownSink {
                value: other.to_owned(),
            });
        }
    };

    Ok(PublishSettings {
        sink,
        notes_file: raw.notes_file.map(|p| resolve_relative(root, &p)),
    })
}

fn build_matrix(raw: Vec<RawTarget>, root: &Utf8Path) -> Result<TargetMatrix> {
    let targets = raw
        .into_iter()
        .map(|t| {
            let triple = TargetTriple::try_from(t.triple)?;
            let format = t.archive.as_deref().map(str::parse::<ArchiveFormat>).transpose()?;
            let extra_files = t
                .extra_files
                .iter()
                .map(|p| resolve_relative(root, p))
                .collect();
            Ok(TargetSpec::new(t.name, triple, format).with_extra_files(extra_files))
        })
        .collect::<Result<Vec<_>>>()?;
    TargetMatrix::new(targets)
}

fn resolve_relative(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
