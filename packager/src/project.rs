//! Project manifest metadata.
//!
//! The desktop build embeds the backend's Python project and needs two facts
//! from its `pyproject.toml`: the release version, which must be present, and
//! the supported interpreter range, which is advisory.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

/// Errors from reading the project manifest.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// The manifest could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid TOML.
    #[error("invalid project manifest {path}: {source}")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// `project.version` is absent, not a string, or blank.
    #[error("Unable to resolve project.version from {path}")]
    MissingVersion {
        /// The manifest path.
        path: Utf8PathBuf,
    },
}

/// Read the trimmed `project.version` from a TOML project manifest.
///
/// # Errors
///
/// Returns a [`ProjectError`] if the file cannot be read or parsed, or if the
/// version is missing or blank.
pub fn read_project_version(path: &Utf8Path) -> Result<String, ProjectError> {
    let table = load_table(path)?;
    table
        .get("project")
        .and_then(|project| project.get("version"))
        .and_then(toml::Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ProjectError::MissingVersion {
            path: path.to_path_buf(),
        })
}

/// In-band result of looking up `project.requires-python`.
///
/// Serializes to `{"requires_python": ..., "error": ...}` with an optional
/// `message`. Failures are reported in the document rather than through the
/// exit status so callers can fall back to a default interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiresPythonReport {
    /// The declared range, or `None` when absent or not a string.
    pub requires_python: Option<String>,
    /// Machine-readable failure code.
    pub error: Option<&'static str>,
    /// Human-readable failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error code reported when the manifest cannot be read or parsed.
pub const PARSE_FAILED: &str = "parse_failed";

impl RequiresPythonReport {
    const fn found(requires_python: Option<String>) -> Self {
        Self {
            requires_python,
            error: None,
            message: None,
        }
    }

    const fn failed(message: String) -> Self {
        Self {
            requires_python: None,
            error: Some(PARSE_FAILED),
            message: Some(message),
        }
    }

    /// Render the report as a single-line JSON object.
    ///
    /// # Errors
    ///
    /// Returns a serialization error, which cannot occur for this shape in
    /// practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Look up `project.requires-python`, never failing.
#[must_use]
pub fn requires_python_report(path: &Utf8Path) -> RequiresPythonReport {
    load_table(path).map_or_else(
        |err| {
            log::debug!("requires-python lookup failed: {err}");
            RequiresPythonReport::failed(format!("Failed to parse pyproject.toml: {}", cause(&err)))
        },
        |table| {
            RequiresPythonReport::found(
                table
                    .get("project")
                    .and_then(|project| project.get("requires-python"))
                    .and_then(toml::Value::as_str)
                    .map(str::to_owned),
            )
        },
    )
}

fn cause(err: &ProjectError) -> String {
    match err {
        ProjectError::Read { source, .. } => source.to_string(),
        ProjectError::Parse { source, .. } => source.message().to_owned(),
        ProjectError::MissingVersion { .. } => err.to_string(),
    }
}

fn load_table(path: &Utf8Path) -> Result<toml::Table, ProjectError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    contents.parse().map_err(|source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
