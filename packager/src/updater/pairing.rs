//! Detached signature lookup for updater bundles.

use super::scanner::{ArtifactFile, SIGNATURE_SUFFIX};
use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// A signature file exists but could not be read.
#[derive(Debug, thiserror::Error)]
#[error("failed to read signature {path}: {source}")]
pub struct SignatureReadError {
    /// The signature path.
    pub path: Utf8PathBuf,
    /// The underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// Outcome of looking for a bundle's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// The signature was found; holds its trimmed contents.
    Signed(String),
    /// No signature file sits next to the bundle.
    Missing {
        /// Where the signature was expected.
        expected: Utf8PathBuf,
    },
}

/// The path a bundle's detached signature is expected at.
#[must_use]
pub fn signature_path(bundle: &Utf8Path) -> Utf8PathBuf {
    let mut path = bundle.as_str().to_owned();
    path.push_str(SIGNATURE_SUFFIX);
    Utf8PathBuf::from(path)
}

/// Read the signature colocated with `bundle`.
///
/// A missing file is reported as [`Pairing::Missing`] rather than an error
/// so callers can drop the bundle and carry on.
///
/// # Errors
///
/// Returns [`SignatureReadError`] if the file exists but cannot be read.
pub fn pair_signature(bundle: &ArtifactFile) -> Result<Pairing, SignatureReadError> {
    let path = signature_path(bundle.path());
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(Pairing::Signed(contents.trim().to_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Pairing::Missing { expected: path }),
        Err(source) => Err(SignatureReadError { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn bundle_in(dir: &Utf8Path) -> ArtifactFile {
        let path = dir.join("AstrBot_1.0.0_windows_x86_64_updater.zip");
        fs::write(&path, b"bundle").expect("bundle");
        ArtifactFile::new(path).expect("artifact")
    }

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, root)
    }

    #[test]
    fn signature_path_appends_suffix() {
        assert_eq!(
            signature_path(Utf8Path::new("out/A.tar.gz")),
            Utf8PathBuf::from("out/A.tar.gz.sig")
        );
    }

    #[test]
    fn reads_trimmed_signature() {
        let (_temp, root) = temp_root();
        let bundle = bundle_in(&root);
        fs::write(signature_path(bundle.path()), "  dW50cnVzdGVk\n\n").expect("sig");

        assert_eq!(
            pair_signature(&bundle).expect("pair"),
            Pairing::Signed("dW50cnVzdGVk".to_owned())
        );
    }

    #[test]
    fn missing_signature_is_not_an_error() {
        let (_temp, root) = temp_root();
        let bundle = bundle_in(&root);

        let pairing = pair_signature(&bundle).expect("pair");
        assert_eq!(
            pairing,
            Pairing::Missing {
                expected: signature_path(bundle.path())
            }
        );
    }

    #[test]
    fn signature_in_another_directory_does_not_count() {
        let (_temp, root) = temp_root();
        let bundle = bundle_in(&root);
        let elsewhere = root.join("other");
        fs::create_dir_all(&elsewhere).expect("dir");
        fs::write(
            elsewhere.join("AstrBot_1.0.0_windows_x86_64_updater.zip.sig"),
            "sig",
        )
        .expect("sig");

        assert!(matches!(
            pair_signature(&bundle).expect("pair"),
            Pairing::Missing { .. }
        ));
    }
}
