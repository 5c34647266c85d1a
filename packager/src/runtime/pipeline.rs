//! Runtime acquisition orchestrator.
//!
//! Runs the acquisition stages strictly in order:
//!
//! 1. resolve the trusted digest from release metadata;
//! 2. download the archive with retry;
//! 3. verify the archive against the trusted digest;
//! 4. extract into a fresh staging directory and check its layout;
//! 5. replace the install directory with the staged tree;
//! 6. probe the installed interpreter.
//!
//! Every failure is fatal and propagates unchanged. The install directory is
//! only touched after verification and extraction have both succeeded.

use camino::Utf8PathBuf;
use std::io::Write;
use std::path::Path;

use super::asset::ARCHIVE_ROOT_DIR;
use super::digest::{IntegrityError, Sha256Digest, verify_file};
use super::extraction::{ArchiveExtractor, ExtractionError, TarGzExtractor};
use super::fetch::{ArchiveFetcher, FetchError};
use super::install::{InstallError, RuntimeInstaller};
use super::metadata::{DigestResolver, MetadataError};
use super::probe::{CommandExecutor, ProbeError, RuntimeProbe, SystemCommandExecutor};
use super::request::RuntimeRequest;
use super::transport::{ReleaseTransport, UreqTransport};
use crate::output::write_stderr_line;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};

/// Errors from any acquisition stage.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// The trusted digest could not be resolved.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The archive could not be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The archive did not match the trusted digest.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The archive could not be extracted or had the wrong layout.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The staged runtime could not be installed.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// The installed runtime failed its smoke checks.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// The scratch directory could not be prepared.
    #[error("failed to prepare scratch directory {path}: {source}")]
    Scratch {
        /// The scratch root.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Collaborators used by the pipeline, injectable for tests.
pub struct AcquisitionDeps<'a> {
    /// HTTP transport for metadata and downloads.
    pub transport: &'a dyn ReleaseTransport,
    /// Sleeper used between retries.
    pub sleeper: &'a dyn Sleeper,
    /// Archive extractor.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Command executor for the probe.
    pub executor: &'a dyn CommandExecutor,
}

/// Options for one acquisition run.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquisitionOptions {
    /// Retry policy shared by the metadata and download stages.
    pub policy: RetryPolicy,
    /// When true, suppress progress output.
    pub quiet: bool,
}

/// A successfully installed and probed runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredRuntime {
    /// The install directory.
    pub install_dir: Utf8PathBuf,
    /// The asset that was installed.
    pub asset_name: String,
    /// The verified archive digest.
    pub digest: Sha256Digest,
    /// The version reported by the interpreter.
    pub version: String,
}

/// Acquire the runtime described by `request` using production
/// implementations.
///
/// # Errors
///
/// Returns the first stage failure as an [`AcquisitionError`].
pub fn acquire_runtime(
    request: &RuntimeRequest,
    options: AcquisitionOptions,
    stderr: &mut dyn Write,
) -> Result<AcquiredRuntime, AcquisitionError> {
    let transport = UreqTransport::new();
    let extractor = TarGzExtractor::new(ARCHIVE_ROOT_DIR);
    let executor = SystemCommandExecutor::default();
    let deps = AcquisitionDeps {
        transport: &transport,
        sleeper: &ThreadSleeper,
        extractor: &extractor,
        executor: &executor,
    };
    acquire_runtime_with(request, &deps, options, stderr)
}

/// Testable inner function with injected dependencies.
///
/// # Errors
///
/// Returns the first stage failure as an [`AcquisitionError`].
pub fn acquire_runtime_with(
    request: &RuntimeRequest,
    deps: &AcquisitionDeps<'_>,
    options: AcquisitionOptions,
    stderr: &mut dyn Write,
) -> Result<AcquiredRuntime, AcquisitionError> {
    let mut progress = |message: String| {
        if !options.quiet {
            write_stderr_line(stderr, message);
        }
    };
    let asset = request.asset();
    let scratch = request.scratch_dir();
    std::fs::create_dir_all(scratch).map_err(|source| AcquisitionError::Scratch {
        path: scratch.to_path_buf(),
        source,
    })?;

    progress(format!("Resolving trusted digest for {}...", asset.name()));
    let expected = DigestResolver::new(deps.transport, deps.sleeper)
        .with_policy(options.policy)
        .with_token(request.token())
        .resolve(asset)?;

    let archive_path = request.archive_path();
    progress(format!("Downloading {}...", asset.url()));
    ArchiveFetcher::new(deps.transport, deps.sleeper)
        .with_policy(options.policy)
        .fetch(asset.url(), archive_path.as_std_path())?;

    let digest = verify_file(archive_path.as_std_path(), &expected)
        .inspect_err(|_| discard(archive_path.as_std_path()))?;
    progress(format!("Verified {expected}."));

    let staging_dir = request.staging_dir();
    let staged_root = deps
        .extractor
        .extract(archive_path.as_std_path(), staging_dir.as_std_path())
        .inspect_err(|_| discard(staging_dir.as_std_path()))?;

    let install_dir = request.install_dir();
    progress(format!("Installing runtime to {install_dir}..."));
    RuntimeInstaller.install(&staged_root, install_dir.as_std_path())?;

    let report = RuntimeProbe::new(deps.executor).probe(install_dir.as_std_path())?;
    progress(format!("Runtime probe passed: {}", report.version));

    discard(archive_path.as_std_path());
    discard(staging_dir.as_std_path());

    Ok(AcquiredRuntime {
        install_dir,
        asset_name: asset.name().to_owned(),
        digest,
        version: report.version,
    })
}

/// Remove a scratch artefact, logging rather than failing.
fn discard(path: &Path) {
    if std::fs::symlink_metadata(path).is_err() {
        return;
    }
    let removal = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(e) = removal {
        log::warn!("failed to clean up {}: {e}", path.display());
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
