//! Application bundle name resolution.
//!
//! The macOS packaging steps need the `.app` directory name the bundler will
//! produce. It comes from an explicit override when one is set, otherwise from
//! the first product name found in the bundler's JSON config.

use crate::output::append_step_output;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Source label used for overrides when none is given.
pub const DEFAULT_OVERRIDE_SOURCE: &str = "env:ASTRBOT_MACOS_APP_BUNDLE_NAME";

/// Step-output key carrying the resolved name.
pub const NAME_OUTPUT_KEY: &str = "app_bundle_name";

/// Step-output key carrying where the name came from.
pub const SOURCE_OUTPUT_KEY: &str = "app_bundle_name_source";

/// Config paths consulted in priority order.
const CANDIDATES: &[&[&str]] = &[
    &["productName"],
    &["bundle", "productName"],
    &["tauri", "productName"],
    &["tauri", "bundle", "productName"],
    &["package", "productName"],
];

/// Errors from bundle-name resolution.
#[derive(Debug, thiserror::Error)]
pub enum BundleNameError {
    /// No override was given and the config file is absent.
    #[error("Required file not found: {path} (or set ASTRBOT_MACOS_APP_BUNDLE_NAME).")]
    ConfigMissing {
        /// The config path.
        path: Utf8PathBuf,
    },

    /// The config could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// The config path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config is not valid JSON.
    #[error("Failed to parse JSON from {path}: {source}")]
    Parse {
        /// The config path.
        path: Utf8PathBuf,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// No candidate path held a non-empty string.
    #[error("Unable to resolve app bundle name from {path}. Expected one of: {}.", candidate_labels())]
    NotFound {
        /// The config path.
        path: Utf8PathBuf,
    },

    /// Normalization left nothing.
    #[error("Resolved app bundle name is empty after normalization (possible value was only '.app').")]
    Empty,

    /// The step-output file could not be written.
    #[error("failed to write step output to {}: {source}", .path.display())]
    StepOutput {
        /// The step-output path.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A resolved bundle name and the place it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleName {
    /// The normalized name, without an `.app` suffix.
    pub name: String,
    /// Where the name was found, e.g. `tauri.conf.json productName`.
    pub source: String,
}

impl fmt::Display for BundleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolved app bundle name: {} (source={})", self.name, self.source)
    }
}

/// An explicit name that bypasses the config lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOverride {
    /// The raw name; ignored when blank.
    pub name: String,
    /// Label reported as the source.
    pub source: String,
}

impl NameOverride {
    /// An override labelled with [`DEFAULT_OVERRIDE_SOURCE`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: DEFAULT_OVERRIDE_SOURCE.to_owned(),
        }
    }
}

/// Resolve the bundle name from `name_override` or the config at `config`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use desktop_packager::bundle_name::{NameOverride, resolve_bundle_name};
///
/// let resolved = resolve_bundle_name(
///     Utf8Path::new("unused.json"),
///     Some(&NameOverride::new(" AstrBot.APP ")),
/// )
/// .expect("override wins");
/// assert_eq!(resolved.name, "AstrBot");
/// assert_eq!(resolved.source, "env:ASTRBOT_MACOS_APP_BUNDLE_NAME");
/// ```
///
/// # Errors
///
/// Returns a [`BundleNameError`] when the config is missing or has no product
/// name, or when the name is empty after normalization.
pub fn resolve_bundle_name(
    config: &Utf8Path,
    name_override: Option<&NameOverride>,
) -> Result<BundleName, BundleNameError> {
    let (raw, source) = name_override
        .filter(|o| !o.name.trim().is_empty())
        .map_or_else(
            || from_config(config),
            |explicit| Ok((explicit.name.clone(), explicit.source.clone())),
        )?;
    let name = normalize_bundle_name(&raw);
    if name.is_empty() {
        return Err(BundleNameError::Empty);
    }
    log::debug!("bundle name {name} resolved from {source}");
    Ok(BundleName { name, source })
}

/// Trim `raw` and drop one trailing `.app`, ignoring case.
///
/// # Examples
///
/// ```
/// use desktop_packager::bundle_name::normalize_bundle_name;
///
/// assert_eq!(normalize_bundle_name("  AstrBot .app "), "AstrBot");
/// assert_eq!(normalize_bundle_name("AstrBot"), "AstrBot");
/// ```
#[must_use]
pub fn normalize_bundle_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let stem = trimmed
        .len()
        .checked_sub(".app".len())
        .and_then(|split| trimmed.split_at_checked(split))
        .filter(|(_, suffix)| suffix.eq_ignore_ascii_case(".app"))
        .map_or(trimmed, |(stem, _)| stem);
    stem.trim().to_owned()
}

/// Append the resolved name and source to a CI step-output file.
///
/// # Errors
///
/// Returns [`BundleNameError::StepOutput`] if the file cannot be written.
pub fn write_step_outputs(path: &Path, resolved: &BundleName) -> Result<(), BundleNameError> {
    append_step_output(path, NAME_OUTPUT_KEY, &resolved.name)
        .and_then(|()| append_step_output(path, SOURCE_OUTPUT_KEY, &resolved.source))
        .map_err(|source| BundleNameError::StepOutput {
            path: path.to_path_buf(),
            source,
        })
}

fn from_config(config: &Utf8Path) -> Result<(String, String), BundleNameError> {
    if !config.is_file() {
        return Err(BundleNameError::ConfigMissing {
            path: config.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(config).map_err(|source| BundleNameError::Read {
        path: config.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_str(&contents).map_err(|source| BundleNameError::Parse {
        path: config.to_path_buf(),
        source,
    })?;
    let file_name = config.file_name().unwrap_or("config");

    CANDIDATES
        .iter()
        .find_map(|keys| {
            keys.iter()
                .try_fold(&document, |node, key| node.get(key))
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map(|name| (name.to_owned(), format!("{file_name} {}", keys.join("."))))
        })
        .ok_or_else(|| BundleNameError::NotFound {
            path: config.to_path_buf(),
        })
}

fn candidate_labels() -> String {
    CANDIDATES
        .iter()
        .map(|keys| keys.join("."))
        .collect::<Vec<_>>()
        .join(", ")
}
