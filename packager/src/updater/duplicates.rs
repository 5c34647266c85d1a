//! Duplicate filename detection over a merged artifact tree.
//!
//! Build jobs for each platform upload their outputs separately and the
//! release job merges them into one directory. Manifest generation assumes
//! every bundle name is unique across that tree, so any basename seen twice
//! fails the release.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fmt;
use walkdir::WalkDir;

/// One basename shared by several files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// The shared basename.
    pub name: String,
    /// Every path carrying the name, sorted.
    pub paths: Vec<Utf8PathBuf>,
}

/// Every duplicated basename in a tree, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicates(pub Vec<DuplicateGroup>);

impl fmt::Display for Duplicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duplicate artifact filenames detected after merge:")?;
        for group in &self.0 {
            write!(f, "\n- {}", group.name)?;
            for path in &group.paths {
                write!(f, "\n  - {path}")?;
            }
        }
        Ok(())
    }
}

/// Errors from the duplicate check.
#[derive(Debug, thiserror::Error)]
pub enum DuplicateArtifactsError {
    /// The root does not exist.
    #[error("Artifacts directory not found: {path}")]
    RootMissing {
        /// The requested root.
        path: Utf8PathBuf,
    },

    /// The root is not a directory.
    #[error("Artifacts path is not a directory: {path}")]
    NotADirectory {
        /// The requested root.
        path: Utf8PathBuf,
    },

    /// The tree could not be walked.
    #[error("failed to scan artifacts: {0}")]
    Walk(#[from] walkdir::Error),

    /// At least one basename occurs more than once.
    #[error("{0}")]
    Duplicates(Duplicates),
}

/// Fails when any file basename under a root occurs more than once.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateGuard;

impl DuplicateGuard {
    /// Check `root`, returning the number of files inspected.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateArtifactsError::Duplicates`] listing every
    /// offending path, or an error if `root` is missing, not a directory, or
    /// unreadable.
    pub fn check(&self, root: &Utf8Path) -> Result<usize, DuplicateArtifactsError> {
        if !root.exists() {
            return Err(DuplicateArtifactsError::RootMissing {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(DuplicateArtifactsError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut by_name: BTreeMap<String, Vec<Utf8PathBuf>> = BTreeMap::new();
        let mut inspected = 0;
        for entry_result in WalkDir::new(root) {
            let entry = entry_result?;
            // Symlinked files count; symlinked directories are not descended.
            if !entry.path().is_file() {
                continue;
            }
            inspected += 1;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = Utf8PathBuf::from_path_buf(entry.into_path())
                .unwrap_or_else(|raw| Utf8PathBuf::from(raw.to_string_lossy().into_owned()));
            by_name.entry(name).or_default().push(path);
        }

        let groups: Vec<DuplicateGroup> = by_name
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(name, mut paths)| {
                paths.sort();
                DuplicateGroup { name, paths }
            })
            .collect();

        if groups.is_empty() {
            log::debug!("{inspected} artifact(s) under {root} have unique names");
            Ok(inspected)
        } else {
            Err(DuplicateArtifactsError::Duplicates(Duplicates(groups)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;

    #[fixture]
    fn root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, root)
    }

    fn touch(root: &Utf8Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("dir");
        fs::write(path, relative).expect("file");
    }

    #[rstest]
    fn unique_names_pass(root: (tempfile::TempDir, Utf8PathBuf)) {
        let (_temp, root) = root;
        touch(&root, "linux/A.tar.gz");
        touch(&root, "windows/A.zip");
        touch(&root, "windows/A.zip.sig");

        assert_eq!(DuplicateGuard.check(&root).expect("unique"), 3);
    }

    #[rstest]
    fn reports_every_duplicate_path(root: (tempfile::TempDir, Utf8PathBuf)) {
        let (_temp, root) = root;
        touch(&root, "job-b/A.zip");
        touch(&root, "job-a/A.zip");
        touch(&root, "job-a/B.zip");

        let err = DuplicateGuard.check(&root).expect_err("duplicate");
        let DuplicateArtifactsError::Duplicates(Duplicates(groups)) = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(
            groups,
            &vec![DuplicateGroup {
                name: "A.zip".to_owned(),
                paths: vec![root.join("job-a/A.zip"), root.join("job-b/A.zip")],
            }]
        );
        let message = err.to_string();
        assert!(message.starts_with("Duplicate artifact filenames detected after merge:\n- A.zip\n  - "));
        assert!(message.contains("job-b"));
    }

    #[rstest]
    fn directories_with_equal_names_are_ignored(root: (tempfile::TempDir, Utf8PathBuf)) {
        let (_temp, root) = root;
        touch(&root, "x/bundle/A.zip");
        touch(&root, "y/bundle/B.zip");

        assert!(DuplicateGuard.check(&root).is_ok());
    }

    #[cfg(unix)]
    #[rstest]
    fn symlinked_files_take_part(root: (tempfile::TempDir, Utf8PathBuf)) {
        let (_temp, base) = root;
        touch(&base, "merged/job-a/A.zip");
        touch(&base, "store/A.zip");
        fs::create_dir_all(base.join("merged/job-b")).expect("dir");
        std::os::unix::fs::symlink(base.join("store/A.zip"), base.join("merged/job-b/A.zip"))
            .expect("symlink");

        let err = DuplicateGuard.check(&base.join("merged")).expect_err("duplicate");
        assert!(err.to_string().contains("job-b"), "{err}");
    }

    #[rstest]
    fn missing_root_fails(root: (tempfile::TempDir, Utf8PathBuf)) {
        let (_temp, root) = root;
        let result = DuplicateGuard.check(&root.join("absent"));
        assert!(matches!(result, Err(DuplicateArtifactsError::RootMissing { .. })));
    }

    #[rstest]
    fn file_root_fails(root: (tempfile::TempDir, Utf8PathBuf)) {
        let (_temp, root) = root;
        touch(&root, "file.txt");
        let result = DuplicateGuard.check(&root.join("file.txt"));
        assert!(matches!(result, Err(DuplicateArtifactsError::NotADirectory { .. })));
    }
}
