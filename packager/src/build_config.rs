//! Build-config overlay for updater settings.
//!
//! Release builds merge a small JSON overlay into the application's bundler
//! configuration so the updater endpoint and signing key can be injected per
//! release without editing the checked-in config.

use crate::output::write_stderr_line;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::io::Write;

/// Endpoint used when none is supplied.
pub const DEFAULT_UPDATER_ENDPOINT: &str =
    "https://github.com/AstrBotDevs/AstrBot-desktop/releases/latest/download/latest.json";

/// Errors from writing the overlay.
#[derive(Debug, thiserror::Error)]
pub enum BuildConfigError {
    /// The overlay could not be serialized.
    #[error("failed to serialize build config: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The overlay could not be written.
    #[error("failed to write build config to {path}: {source}")]
    Write {
        /// The output path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Inputs for the overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdaterSettings {
    /// Update feed URL; blank selects [`DEFAULT_UPDATER_ENDPOINT`].
    pub endpoint: Option<String>,
    /// Minisign public key; omitted from the overlay when blank.
    pub pubkey: Option<String>,
    /// Skip producing signed updater bundles.
    pub disable_artifacts: bool,
}

/// The serialized overlay document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfigOverlay {
    bundle: BundleSection,
    plugins: PluginsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleSection {
    create_updater_artifacts: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct PluginsSection {
    updater: UpdaterSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct UpdaterSection {
    endpoints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pubkey: Option<String>,
}

impl BuildConfigOverlay {
    /// Build the overlay for `settings`.
    ///
    /// # Examples
    ///
    /// ```
    /// use desktop_packager::build_config::{BuildConfigOverlay, UpdaterSettings};
    ///
    /// let overlay = BuildConfigOverlay::new(&UpdaterSettings::default());
    /// assert!(overlay.creates_updater_artifacts());
    /// assert!(overlay.endpoints().iter().all(|e| e.ends_with("/latest.json")));
    /// ```
    #[must_use]
    pub fn new(settings: &UpdaterSettings) -> Self {
        let endpoint = non_blank(settings.endpoint.as_deref())
            .unwrap_or(DEFAULT_UPDATER_ENDPOINT)
            .to_owned();
        Self {
            bundle: BundleSection {
                create_updater_artifacts: !settings.disable_artifacts,
            },
            plugins: PluginsSection {
                updater: UpdaterSection {
                    endpoints: vec![endpoint],
                    pubkey: non_blank(settings.pubkey.as_deref()).map(str::to_owned),
                },
            },
        }
    }

    /// Whether the bundler should emit signed updater bundles.
    #[must_use]
    pub const fn creates_updater_artifacts(&self) -> bool {
        self.bundle.create_updater_artifacts
    }

    /// The configured update feeds.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.plugins.updater.endpoints
    }

    /// Render as JSON with a two-space indent.
    ///
    /// # Errors
    ///
    /// Returns a serialization error, which cannot occur for this shape in
    /// practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Write the overlay for `settings` to `output`, creating parent directories.
///
/// # Errors
///
/// Returns a [`BuildConfigError`] if the file cannot be written.
pub fn render_build_config(
    output: &Utf8Path,
    settings: &UpdaterSettings,
    stderr: &mut dyn Write,
) -> Result<BuildConfigOverlay, BuildConfigError> {
    let overlay = BuildConfigOverlay::new(settings);
    let json = overlay.to_json()?;
    let write_err = |source: std::io::Error| BuildConfigError::Write {
        path: output.to_path_buf(),
        source,
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(output, json).map_err(write_err)?;
    write_stderr_line(stderr, format!("Generated Tauri build config: {output}"));
    Ok(overlay)
}
