//! Updater manifest model, assembly, and output.
//!
//! The manifest is the `latest.json` document read by the desktop updater:
//!
//! ```json
//! {
//!   "version": "4.19.0",
//!   "notes": "Release v4.19.0",
//!   "pub_date": "2025-10-01T12:00:00Z",
//!   "platforms": {
//!     "windows-x86_64": { "signature": "...", "url": "https://..." }
//!   }
//! }
//! ```
//!
//! Bundles are classified, grouped by platform key, and paired with their
//! detached signatures. Unclassified bundles and bundles without a signature
//! are reported and left out; they never block the release.

use super::classify::PlatformClassifier;
use super::pairing::{Pairing, SignatureReadError, pair_signature};
use super::scanner::{ArtifactFile, ArtifactScanner, ScanError};
use crate::output::write_stderr_line;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Hosting root for release downloads.
pub const RELEASE_HOST: &str = "https://github.com";

/// Timestamp layout for `pub_date`: UTC with second precision.
const PUB_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One platform's download location and signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Contents of the detached signature.
    pub signature: String,
    /// Download URL of the bundle.
    pub url: String,
}

/// The update manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Application version being released.
    pub version: String,
    /// Release notes.
    pub notes: String,
    /// Publication time, UTC, second precision.
    pub pub_date: String,
    /// Entries keyed by `{os}-{arch}`.
    pub platforms: BTreeMap<String, PlatformEntry>,
}

/// What to do when two bundles map to the same platform key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateKeyPolicy {
    /// Fail the build.
    #[default]
    Reject,
    /// Keep the bundle that comes later in scan order, with a warning.
    LastWins,
}

/// Errors arising while producing a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The artifact tree could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A signature file could not be read.
    #[error(transparent)]
    Signature(#[from] SignatureReadError),

    /// Two bundles map to the same platform key.
    #[error("platform {key} is provided by both {first} and {second}")]
    DuplicatePlatformKey {
        /// The contested platform key.
        key: String,
        /// The bundle seen first.
        first: String,
        /// The bundle seen second.
        second: String,
    },

    /// A bundle's embedded version differs from the release version.
    #[error("artifact {file} has version {found}, expected {expected}")]
    VersionMismatch {
        /// The bundle filename.
        file: String,
        /// The version embedded in the filename.
        found: String,
        /// The release version.
        expected: String,
    },

    /// The manifest could not be serialised.
    #[error("failed to serialise manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The manifest file could not be written.
    #[error("failed to write manifest {path}: {source}")]
    Write {
        /// The output path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Release parameters for a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSettings {
    /// Repository in `owner/name` form.
    pub repository: String,
    /// Release tag the bundles are attached to.
    pub release_tag: String,
    /// Application version.
    pub version: String,
    /// Release notes; defaults to `Release {release_tag}`.
    pub notes: Option<String>,
    /// Fail when a bundle's embedded version differs from `version`.
    pub strict_version_match: bool,
    /// Handling of platform-key collisions.
    pub duplicate_policy: DuplicateKeyPolicy,
}

impl ManifestSettings {
    fn notes(&self) -> String {
        self.notes
            .clone()
            .unwrap_or_else(|| format!("Release {}", self.release_tag))
    }
}

/// Build the download URL of `bundle_name` in a release.
///
/// # Examples
///
/// ```
/// use desktop_packager::updater::manifest::download_url;
///
/// assert_eq!(
///     download_url("org/repo", "v1.0.0", "A.zip"),
///     "https://github.com/org/repo/releases/download/v1.0.0/A.zip"
/// );
/// ```
#[must_use]
pub fn download_url(repository: &str, release_tag: &str, bundle_name: &str) -> String {
    format!("{RELEASE_HOST}/{repository}/releases/download/{release_tag}/{bundle_name}")
}

/// Assembles a [`Manifest`] from scanned artifacts.
pub struct ManifestBuilder<'a> {
    classifier: &'a PlatformClassifier,
    settings: &'a ManifestSettings,
}

impl<'a> ManifestBuilder<'a> {
    /// Create a builder.
    #[must_use]
    pub const fn new(classifier: &'a PlatformClassifier, settings: &'a ManifestSettings) -> Self {
        Self {
            classifier,
            settings,
        }
    }

    /// Build a manifest from `artifacts`, stamped with `pub_date`.
    ///
    /// Signature files in `artifacts` are ignored; each bundle's signature is
    /// looked up next to it. Warnings go to `stderr`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::DuplicatePlatformKey`] under
    /// [`DuplicateKeyPolicy::Reject`], [`ManifestError::VersionMismatch`]
    /// under strict version matching, or [`ManifestError::Signature`] when
    /// a signature exists but is unreadable.
    pub fn build(
        &self,
        artifacts: &[ArtifactFile],
        pub_date: DateTime<Utc>,
        stderr: &mut dyn Write,
    ) -> Result<Manifest, ManifestError> {
        let grouped = self.group_by_platform(artifacts, stderr)?;

        let mut platforms = BTreeMap::new();
        for (key, bundle) in grouped {
            match pair_signature(bundle)? {
                Pairing::Signed(signature) => {
                    let url = download_url(
                        &self.settings.repository,
                        &self.settings.release_tag,
                        bundle.file_name(),
                    );
                    platforms.insert(key, PlatformEntry { signature, url });
                }
                Pairing::Missing { expected } => {
                    log::warn!("no signature at {expected}");
                    write_stderr_line(
                        stderr,
                        format!("Warning: Signature not found for {}", bundle.file_name()),
                    );
                }
            }
        }

        Ok(Manifest {
            version: self.settings.version.clone(),
            notes: self.settings.notes(),
            pub_date: pub_date.format(PUB_DATE_FORMAT).to_string(),
            platforms,
        })
    }

    fn group_by_platform<'b>(
        &self,
        artifacts: &'b [ArtifactFile],
        stderr: &mut dyn Write,
    ) -> Result<BTreeMap<String, &'b ArtifactFile>, ManifestError> {
        let mut grouped: BTreeMap<String, &ArtifactFile> = BTreeMap::new();
        for bundle in artifacts.iter().filter(|a| !a.is_signature()) {
            let Some(platform) = self.classifier.classify(bundle.file_name()) else {
                log::warn!("unclassified artifact {}", bundle.path());
                write_stderr_line(
                    stderr,
                    format!(
                        "Warning: Could not extract platform info from {}",
                        bundle.file_name()
                    ),
                );
                continue;
            };

            let mismatch = platform.version.as_deref().filter(|found| {
                self.settings.strict_version_match && *found != self.settings.version
            });
            if let Some(found) = mismatch {
                return Err(ManifestError::VersionMismatch {
                    file: bundle.file_name().to_owned(),
                    found: found.to_owned(),
                    expected: self.settings.version.clone(),
                });
            }

            let key = platform.key();
            if let Some(previous) = grouped.insert(key.clone(), bundle) {
                match self.settings.duplicate_policy {
                    DuplicateKeyPolicy::Reject => {
                        return Err(ManifestError::DuplicatePlatformKey {
                            key,
                            first: previous.file_name().to_owned(),
                            second: bundle.file_name().to_owned(),
                        });
                    }
                    DuplicateKeyPolicy::LastWins => write_stderr_line(
                        stderr,
                        format!(
                            "Warning: {} replaces {} for platform {key}",
                            bundle.path(),
                            previous.path()
                        ),
                    ),
                }
            }
        }
        Ok(grouped)
    }
}

/// Write `manifest` to `path` as two-space-indented JSON, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`ManifestError::Write`] on I/O failure.
pub fn write_manifest(path: &Utf8Path, manifest: &Manifest) -> Result<(), ManifestError> {
    let write_error = |source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    std::fs::write(path, json).map_err(write_error)
}

/// Inputs for a full manifest run.
#[derive(Debug, Clone)]
pub struct ManifestJob {
    /// Root of the merged artifact tree.
    pub root: Utf8PathBuf,
    /// Output file for the manifest.
    pub output: Utf8PathBuf,
    /// Release parameters.
    pub settings: ManifestSettings,
    /// When true, suppress progress output.
    pub quiet: bool,
}

/// Scan, build, and write a manifest with the desktop naming rules.
///
/// # Errors
///
/// Returns any [`ManifestError`]; the output file is only written once the
/// manifest has been fully built.
pub fn generate_manifest(job: &ManifestJob, stderr: &mut dyn Write) -> Result<Manifest, ManifestError> {
    generate_manifest_with(
        job,
        &ArtifactScanner::updater(),
        &PlatformClassifier::desktop(),
        Utc::now(),
        stderr,
    )
}

/// Testable inner function with injected scanner, classifier, and clock.
///
/// # Errors
///
/// Returns any [`ManifestError`].
pub fn generate_manifest_with(
    job: &ManifestJob,
    scanner: &ArtifactScanner,
    classifier: &PlatformClassifier,
    now: DateTime<Utc>,
    stderr: &mut dyn Write,
) -> Result<Manifest, ManifestError> {
    let artifacts = scanner.scan(&job.root)?;
    if artifacts.is_empty() {
        log::warn!("no updater artifacts under {}", job.root);
        write_stderr_line(stderr, "Warning: No updater artifacts found");
    } else if !job.quiet {
        write_stderr_line(stderr, format!("Found {} updater artifacts", artifacts.len()));
    }

    let manifest = ManifestBuilder::new(classifier, &job.settings).build(&artifacts, now, stderr)?;
    write_manifest(&job.output, &manifest)?;

    if !job.quiet {
        write_stderr_line(stderr, format!("Generated updater manifest: {}", job.output));
        let keys: Vec<&str> = manifest.platforms.keys().map(String::as_str).collect();
        write_stderr_line(stderr, format!("Platforms: [{}]", keys.join(", ")));
    }
    Ok(manifest)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
