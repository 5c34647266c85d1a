//! Archive download with bounded retry.

use super::transport::{ReleaseTransport, TransportError};
use crate::retry::{RetryPolicy, Sleeper};
use std::path::{Path, PathBuf};

/// Errors arising from archive downloads.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Every download attempt failed.
    #[error("failed to download {url} after {attempts} attempt(s)")]
    DownloadFailed {
        /// The archive URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: TransportError,
    },

    /// A stale file at the destination could not be removed.
    #[error("failed to clear download destination {}: {source}", .path.display())]
    ClearDestination {
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Downloads a release asset to disk, retrying transient failures.
///
/// The destination is deleted before the first attempt and after every
/// failed one, so a partial body from an interrupted transfer is never
/// mistaken for a complete archive.
pub struct ArchiveFetcher<'a> {
    transport: &'a dyn ReleaseTransport,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
}

impl<'a> ArchiveFetcher<'a> {
    /// Create a fetcher with the default retry policy.
    #[must_use]
    pub fn new(transport: &'a dyn ReleaseTransport, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::default(),
        }
    }

    /// Use `policy` for download attempts.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Download `url` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DownloadFailed`] carrying the last transport
    /// error once the retry budget is spent.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        remove_stale(dest)?;
        self.policy
            .run(self.sleeper, |attempt| {
                log::debug!("downloading {url} (attempt {attempt})");
                self.transport.download(url, dest).inspect_err(|_| {
                    if let Err(e) = remove_stale(dest) {
                        log::warn!("{e}");
                    }
                })
            })
            .map_err(|exhausted| FetchError::DownloadFailed {
                url: url.to_owned(),
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
    }
}

/// Delete `path` if it exists.
fn remove_stale(path: &Path) -> Result<(), FetchError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FetchError::ClearDestination {
            path: path.to_path_buf(),
            source,
        }),
    }
}
