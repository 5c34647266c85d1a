//! Top-level error type for the packager CLI.
//!
//! Each component reports failures through its own error enum. The binary
//! folds them into [`PackagerError`], prints the message, and exits non-zero.

use crate::build_config::BuildConfigError;
use crate::bundle_name::BundleNameError;
use crate::env::MissingEnv;
use crate::project::ProjectError;
use crate::runtime::pipeline::AcquisitionError;
use crate::updater::duplicates::DuplicateArtifactsError;
use crate::updater::manifest::ManifestError;
use thiserror::Error;

/// Errors surfaced by a packager subcommand.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// Required configuration was missing or invalid.
    #[error("configuration error: {reason}")]
    Configuration {
        /// Description of the problem.
        reason: String,
    },

    /// Runtime acquisition failed at some stage.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Manifest synthesis failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The merged artifact tree failed the duplicate check.
    #[error(transparent)]
    DuplicateArtifacts(#[from] DuplicateArtifactsError),

    /// The project manifest could not supply metadata.
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// The build-config overlay could not be written.
    #[error(transparent)]
    BuildConfig(#[from] BuildConfigError),

    /// The bundle name could not be resolved.
    #[error(transparent)]
    BundleName(#[from] BundleNameError),

    /// A JSON report could not be rendered.
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to write command output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl From<MissingEnv> for PackagerError {
    fn from(err: MissingEnv) -> Self {
        Self::Configuration {
            reason: err.to_string(),
        }
    }
}

/// Result type for packager subcommands.
pub type Result<T> = std::result::Result<T, PackagerError>;
