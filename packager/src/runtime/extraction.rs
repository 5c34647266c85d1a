//! Archive extraction for runtime archives.
//!
//! Extracts `.tar.gz` archives into a freshly created staging directory with
//! path traversal protection, then checks that the archive produced exactly
//! one expected top-level directory. Any other layout is rejected so an
//! upstream format change is never silently installed.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Trait for extracting runtime archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use desktop_packager::runtime::extraction::TarGzExtractor;
///
/// let extractor = TarGzExtractor::new("python");
/// // Use extractor.extract(archive_path, staging_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `staging_dir`.
    ///
    /// Any existing `staging_dir` is removed first. Returns the path of the
    /// validated top-level directory inside `staging_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the staging directory, [`ExtractionError::UnexpectedLayout`]
    /// if the top level is not exactly the expected directory, and
    /// [`ExtractionError::Io`] on I/O failures.
    fn extract(&self, archive_path: &Path, staging_dir: &Path)
    -> Result<PathBuf, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive does not contain exactly the expected top-level directory.
    #[error("invalid archive layout: expected a single top-level {expected}/ directory, found [{}]", .found.join(", "))]
    UnexpectedLayout {
        /// The required top-level directory name.
        expected: String,
        /// The top-level entries that were actually extracted.
        found: Vec<String>,
    },
}

/// Default extractor using the `tar` and `flate2` crates.
///
/// Validates each entry path before extraction to guard against path
/// traversal (zip-slip).
#[derive(Debug, Clone)]
pub struct TarGzExtractor {
    expected_root: String,
}

impl TarGzExtractor {
    /// Create an extractor requiring `expected_root` as the sole top-level
    /// directory.
    #[must_use]
    pub fn new(expected_root: impl Into<String>) -> Self {
        Self {
            expected_root: expected_root.into(),
        }
    }
}

impl ArchiveExtractor for TarGzExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        staging_dir: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        reset_dir(staging_dir)?;

        let file = fs::File::open(archive_path)?;
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        archive.set_preserve_permissions(true);

        for entry_result in archive.entries()? {
            let mut entry = entry_result?;
            let entry_path = entry.path()?.into_owned();
            validate_entry_path(&entry_path)?;
            if !entry.unpack_in(staging_dir)? {
                return Err(ExtractionError::PathTraversal {
                    path: entry_path.display().to_string(),
                });
            }
        }

        validate_layout(staging_dir, &self.expected_root)
    }
}

/// Remove `dir` if present and recreate it empty.
fn reset_dir(dir: &Path) -> std::io::Result<()> {
    if dir.symlink_metadata().is_ok() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir | Component::Prefix(_)) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Check that `staging_dir` holds exactly one directory named `expected`.
fn validate_layout(staging_dir: &Path, expected: &str) -> Result<PathBuf, ExtractionError> {
    let mut found = fs::read_dir(staging_dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    found.sort();

    let root = staging_dir.join(expected);
    let is_single_expected = matches!(found.as_slice(), [only] if only == expected);
    if !is_single_expected || !root.is_dir() {
        return Err(ExtractionError::UnexpectedLayout {
            expected: expected.to_owned(),
            found,
        });
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ArchiveEntry, runtime_archive_entries, write_tar_gz};
    use rstest::rstest;

    fn extract_entries(entries: &[ArchiveEntry]) -> (tempfile::TempDir, Result<PathBuf, ExtractionError>) {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("runtime.tar.gz");
        write_tar_gz(&archive, entries).expect("write archive");
        let staging = temp.path().join("staging");
        let result = TarGzExtractor::new("python").extract(&archive, &staging);
        (temp, result)
    }

    #[test]
    fn extracts_expected_layout() {
        let (temp, result) = extract_entries(&runtime_archive_entries());
        let root = result.expect("extract");
        assert_eq!(root, temp.path().join("staging").join("python"));
        assert!(root.join("bin").join("python3.12").is_file());
        assert!(root.join("lib").join("ssl.py").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn preserves_symlinks_and_modes() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, result) = extract_entries(&runtime_archive_entries());
        let root = result.expect("extract");
        let link = root.join("bin").join("python3");
        let meta = fs::symlink_metadata(&link).expect("link metadata");
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(&link).expect("read link"), PathBuf::from("python3.12"));
        let mode = fs::metadata(root.join("bin").join("python3.12"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[rstest]
    #[case::wrong_root(vec![ArchiveEntry::Dir("cpython/"), ArchiveEntry::File("cpython/x", b"x".to_vec(), 0o644)])]
    #[case::extra_sibling(vec![ArchiveEntry::Dir("python/"), ArchiveEntry::File("README", b"x".to_vec(), 0o644)])]
    #[case::root_is_file(vec![ArchiveEntry::File("python", b"x".to_vec(), 0o644)])]
    #[case::empty(vec![])]
    fn rejects_unexpected_layout(#[case] entries: Vec<ArchiveEntry>) {
        let (_temp, result) = extract_entries(&entries);
        assert!(
            matches!(result, Err(ExtractionError::UnexpectedLayout { .. })),
            "unexpected result: {result:?}"
        );
    }

    #[test]
    fn clears_existing_staging_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("runtime.tar.gz");
        write_tar_gz(&archive, &runtime_archive_entries()).expect("write archive");
        let staging = temp.path().join("staging");
        fs::create_dir_all(staging.join("leftover")).expect("seed leftover");

        let root = TarGzExtractor::new("python")
            .extract(&archive, &staging)
            .expect("extract");

        assert!(root.is_dir());
        assert!(!staging.join("leftover").exists());
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("python/../../escape.txt")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let path = PathBuf::from(bad_path);
        let result = validate_entry_path(&path);
        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_entry_path(Path::new("python/lib/libpython3.12.so")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_absolute_path() {
        let result = validate_entry_path(Path::new("/etc/passwd"));
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
    }
}
