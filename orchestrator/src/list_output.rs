//! Output formatting for the configured target matrix.
//!
//! This module renders the matrix for `shipwright list`, either as an
//! aligned table or as JSON for scripting.

use serde::Serialize;
use shipwright_common::{Config, TargetSpec};

/// Format the configured matrix for human-readable output.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use shipwright_common::Config;
/// use shipwright_orchestrator::list_output::format_human;
///
/// let config = Config::parse(
///     r#"
/// [project]
/// name = "rask"
///
/// [[targets]]
/// name = "Linux - X86_64"
/// triple = "x86_64-unknown-linux-gnu"
/// archive = "tar.gz"
/// "#,
///     Utf8Path::new("/work/shipwright.toml"),
/// )
/// .expect("valid config");
/// let output = format_human(&config);
/// assert!(output.contains("x86_64-unknown-linux-gnu"));
/// ```
#[must_use]
pub fn format_human(config: &Config) -> String {
    let targets = config.matrix.targets();
    let name_width = column_width(targets.iter().map(TargetSpec::display_name), "TARGET");
    let triple_width = column_width(targets.iter().map(|t| t.triple().as_str()), "TRIPLE");

    let mut output = format!(
        "Project: {} (binary: {})\n\n",
        config.project.name, config.project.binary
    );
    output.push_str(&format!(
        "{:<name_width$}  {:<triple_width$}  ARCHIVE  EXTRA FILES\n",
        "TARGET", "TRIPLE"
    ));

    for target in targets {
        let archive = target
            .archive_format()
            .map_or_else(|| "-".to_owned(), |f| f.to_string());
        let extras = config.extra_files_for(target);
        let extras = if extras.is_empty() {
            "-".to_owned()
        } else {
            extras
                .iter()
                .map(|p| p.file_name().unwrap_or(p.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        output.push_str(&format!(
            "{:<name_width$}  {:<triple_width$}  {archive:<7}  {extras}\n",
            target.display_name(),
            target.triple(),
        ));
    }

    output
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values.map(str::len).max().unwrap_or(0).max(header.len())
}

/// Format the configured matrix as JSON.
///
/// # Errors
///
/// Returns the serialisation error if the matrix cannot be rendered.
pub fn format_json(config: &Config) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&MatrixJson::from_config(config))
}

/// JSON-serializable representation of the configured matrix.
#[derive(Debug, Serialize)]
pub struct MatrixJson<'a> {
    /// Project name.
    pub project: &'a str,
    /// Binary name.
    pub binary: &'a str,
    /// Every target in matrix order.
    pub targets: Vec<TargetEntry<'a>>,
}

impl<'a> MatrixJson<'a> {
    fn from_config(config: &'a Config) -> Self {
        let targets = config
            .matrix
            .iter()
            .map(|target| TargetEntry {
                name: target.display_name(),
                triple: target.triple().as_str(),
                archive: target.archive_format().map(|f| f.extension()),
                extra_files: config
                    .extra_files_for(target)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect();
        Self {
            project: &config.project.name,
            binary: &config.project.binary,
            targets,
        }
    }
}

/// JSON entry for one target.
#[derive(Debug, Serialize)]
pub struct TargetEntry<'a> {
    /// Display name.
    pub name: &'a str,
    /// Target triple.
    pub triple: &'a str,
    /// Archive extension, if the target is releasable.
    pub archive: Option<&'static str>,
    /// Every file packaged next to the binary.
    pub extra_files: Vec<String>,
}
