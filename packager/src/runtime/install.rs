//! Replacement of the runtime install directory with staged contents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Errors arising while installing a staged runtime.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The previous installation could not be removed.
    #[error("failed to remove previous runtime at {}: {source}", .path.display())]
    RemovePrevious {
        /// The install directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Copying an entry into the install directory failed.
    #[error("failed to install {}: {source}", .path.display())]
    Copy {
        /// The destination path being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The staged tree could not be walked.
    #[error("failed to read staged runtime: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Copies a validated staged runtime into its final location.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeInstaller;

impl RuntimeInstaller {
    /// Replace `target` with a copy of `staged_root`.
    ///
    /// Any existing directory at `target` is removed before the copy. On Unix
    /// symbolic links are recreated rather than followed so shared libraries
    /// are not duplicated; elsewhere they are dereferenced.
    ///
    /// # Errors
    ///
    /// Returns an [`InstallError`] if the old tree cannot be removed or any
    /// entry cannot be copied.
    pub fn install(&self, staged_root: &Path, target: &Path) -> Result<(), InstallError> {
        remove_existing(target)?;
        log::debug!(
            "installing runtime from {} to {}",
            staged_root.display(),
            target.display()
        );
        copy_tree(staged_root, target)
    }
}

fn remove_existing(target: &Path) -> Result<(), InstallError> {
    let Ok(meta) = target.symlink_metadata() else {
        return Ok(());
    };
    let removal = if meta.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    removal.map_err(|source| InstallError::RemovePrevious {
        path: target.to_path_buf(),
        source,
    })
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), InstallError> {
    let walker = WalkDir::new(src)
        .follow_links(!cfg!(unix))
        .sort_by_file_name();
    for entry_result in walker {
        let entry = entry_result?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let dest = dst.join(relative);
        let file_type = entry.file_type();
        let copied = if file_type.is_dir() {
            fs::create_dir_all(&dest)
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)
        } else {
            fs::copy(entry.path(), &dest).map(|_| ())
        };
        copied.map_err(|source| InstallError::Copy { path: dest, source })?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::read_link(link)?;
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(link, dest).map(|_| ())
}
