//! Scaffolding for `shipwright init`.
//!
//! Writes a starter `shipwright.toml` describing the five mainstream desktop
//! and server targets. An existing file is never overwritten.

use crate::config::CONFIG_FILE_NAME;
use crate::error::{ConfigError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Targets written into a fresh configuration: display name, triple, archive.
const DEFAULT_TARGETS: &[(&str, &str, &str)] = &[
    ("Linux - X86_64", "x86_64-unknown-linux-gnu", "tar.gz"),
    ("Linux - ARM64", "aarch64-unknown-linux-gnu", "tar.gz"),
    ("macOS - X86_64", "x86_64-apple-darwin", "tar.gz"),
    ("macOS - ARM64", "aarch64-apple-darwin", "tar.gz"),
    ("Windows - X86_64", "x86_64-pc-windows-msvc", "zip"),
];

/// Write a starter configuration into `entry`.
///
/// `entry` may be a directory, in which case `shipwright.toml` is created
/// inside it, or an explicit file path. When `name` is `None` the project
/// name defaults to the name of the directory holding the file.
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyInitialised`] if the file exists,
/// [`ConfigError::NotFound`] if no project name can be derived, and
/// [`ConfigError::Write`] if the file cannot be written.
pub fn scaffold(entry: &Utf8Path, name: Option<&str>) -> Result<Utf8PathBuf> {
    let path = if entry.is_dir() {
        entry.join(CONFIG_FILE_NAME)
    } else {
        entry.to_owned()
    };

    if path.exists() {
        return Err(ConfigError::AlreadyInitialised { path });
    }

    let project_name = match name {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => directory_name(&path)?,
    };

    debug!("writing starter configuration for {project_name} to {path}");
    std::fs::write(&path, render_template(&project_name)).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Render the starter configuration for `project_name`.
#[must_use]
pub fn render_template(project_name: &str) -> String {
    let mut out = format!(
        concat!(
            "[project]\n",
            "name = \"{name}\"\n",
            "binary = \"{name}\"\n",
            "\n",
            "[build]\n",
            "command = \"cargo\"\n",
            "args = [\"build\", \"--release\", \"--locked\"]\n",
            "timeout_secs = 1800\n",
            "\n",
            "[package]\n",
            "output_dir = \"dist\"\n",
            "extra_files = [\"README.md\", \"LICENSE\"]\n",
            "\n",
            "[triggers]\n",
            "exclude_branches = []\n",
            "tag_prefix = \"v\"\n",
            "\n",
            "[publish]\n",
            "sink = \"directory\"\n",
            "directory = \"releases\"\n",
        ),
        name = project_name
    );
    for (display, triple, archive) in DEFAULT_TARGETS {
        out.push_str(&format!(
            "\n[[targets]]\nname = \"{display}\"\ntriple = \"{triple}\"\narchive = \"{archive}\"\n"
        ));
    }
    out
}

fn directory_name(path: &Utf8Path) -> Result<String> {
    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p.to_owned(),
        _ => Utf8PathBuf::from("."),
    };
    let canonical = parent
        .canonicalize_utf8()
        .map_err(|_| ConfigError::NotFound {
            path: parent.clone(),
        })?;
    canonical
        .file_name()
        .map(str::to_owned)
        .ok_or(ConfigError::NotFound { path: canonical.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn temp_root(dir: &TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).expect("utf8 temp dir")
    }

    #[test]
    fn template_parses_as_valid_config() {
        let contents = render_template("rask");
        let config = Config::parse(&contents, Utf8Path::new("/work/rask/shipwright.toml"))
            .expect("template is valid");
        assert_eq!(config.project.name, "rask");
        assert_eq!(config.matrix.len(), DEFAULT_TARGETS.len());
        assert!(config.matrix.require_archive_formats().is_ok());
    }

    #[test]
    fn scaffold_uses_explicit_name() {
        let dir = TempDir::new().expect("temp dir");
        let path = scaffold(temp_root(&dir), Some("widget")).expect("scaffolds");
        let contents = std::fs::read_to_string(&path).expect("read back");
        assert!(contents.contains("name = \"widget\""));
    }

    #[test]
    fn scaffold_defaults_name_to_directory() {
        let dir = TempDir::new().expect("temp dir");
        let project = temp_root(&dir).join("gizmo");
        std::fs::create_dir(&project).expect("mkdir");

        let path = scaffold(&project, None).expect("scaffolds");
        let contents = std::fs::read_to_string(&path).expect("read back");
        assert!(contents.contains("name = \"gizmo\""));
    }

    #[test]
    fn scaffold_refuses_to_overwrite() {
        let dir = TempDir::new().expect("temp dir");
        let root = temp_root(&dir);
        std::fs::write(root.join(CONFIG_FILE_NAME), "existing").expect("write");

        let err = scaffold(root, Some("x")).expect_err("already initialised");
        assert!(matches!(err, ConfigError::AlreadyInitialised { .. }));
    }
}
