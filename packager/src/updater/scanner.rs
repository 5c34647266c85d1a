//! Discovery of updater bundles and signatures under an artifact root.

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

/// Signature files share the bundle name plus this suffix.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Filename suffixes of desktop updater bundles and their signatures.
pub const UPDATER_SUFFIXES: &[&str] = &[
    "_updater.zip",
    "_updater.zip.sig",
    "_updater.tar.gz",
    "_updater.tar.gz.sig",
];

/// Errors arising while scanning an artifact root.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The root does not exist.
    #[error("artifact root does not exist: {path}")]
    RootMissing {
        /// The requested root.
        path: Utf8PathBuf,
    },

    /// The tree could not be walked.
    #[error("failed to scan artifacts: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    path: Utf8PathBuf,
    file_name: String,
}

impl ArtifactFile {
    /// Describe the file at `path`, or `None` if it has no file name.
    #[must_use]
    pub fn new(path: Utf8PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_owned();
        Some(Self { path, file_name })
    }

    /// Full path of the file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Base name of the file.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whether this is a detached signature.
    #[must_use]
    pub fn is_signature(&self) -> bool {
        self.file_name.ends_with(SIGNATURE_SUFFIX)
    }
}

/// Recursively collects files whose names end with one of a fixed set of
/// suffixes.
///
/// Results are in a stable order: entries are visited sorted by file name
/// within each directory.
#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    suffixes: Vec<String>,
}

impl ArtifactScanner {
    /// Create a scanner accepting names that end with any of `suffixes`.
    #[must_use]
    pub fn new<S: AsRef<str>>(suffixes: &[S]) -> Self {
        Self {
            suffixes: suffixes.iter().map(|s| s.as_ref().to_owned()).collect(),
        }
    }

    /// A scanner for desktop updater bundles.
    #[must_use]
    pub fn updater() -> Self {
        Self::new(UPDATER_SUFFIXES)
    }

    /// Scan `root` for matching files.
    ///
    /// Paths that are not valid UTF-8 cannot appear in a manifest URL and
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::RootMissing`] if `root` does not exist, or
    /// [`ScanError::Walk`] if a directory cannot be read.
    pub fn scan(&self, root: &Utf8Path) -> Result<Vec<ArtifactFile>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootMissing {
                path: root.to_path_buf(),
            });
        }

        let mut found = Vec::new();
        for entry_result in WalkDir::new(root).sort_by_file_name() {
            let entry = entry_result?;
            // Symlinked files count; symlinked directories are not descended.
            if !entry.path().is_file() {
                continue;
            }
            let Ok(path) = Utf8PathBuf::try_from(entry.into_path()) else {
                log::warn!("skipping artifact with non UTF-8 path under {root}");
                continue;
            };
            if let Some(artifact) = ArtifactFile::new(path).filter(|a| self.accepts(a.file_name())) {
                log::trace!("found artifact {}", artifact.path());
                found.push(artifact);
            }
        }
        Ok(found)
    }

    fn accepts(&self, file_name: &str) -> bool {
        self.suffixes.iter().any(|suffix| file_name.ends_with(suffix.as_str()))
    }
}

impl Default for ArtifactScanner {
    fn default() -> Self {
        Self::updater()
    }
}
