//! Release asset naming for the standalone Python distribution.
//!
//! Runtime archives are published as GitHub release assets named:
//! `cpython-<version>+<release>-<target>-install_only_stripped.tar.gz`.
//! The digest for each asset is read from the release's API record, which is
//! fetched separately from the archive bytes.

use std::fmt;
use url::Url;

/// Repository that publishes the runtime archives.
pub const DISTRIBUTION_REPO: &str = "astral-sh/python-build-standalone";

/// Top-level directory every runtime archive must contain.
pub const ARCHIVE_ROOT_DIR: &str = "python";

const API_BASE: &str = "https://api.github.com/repos";
const DOWNLOAD_BASE: &str = "https://github.com";
const ASSET_FLAVOUR: &str = "install_only_stripped";
const ASSET_EXTENSION: &str = ".tar.gz";

/// A remote, immutable, named release asset.
///
/// Identity is the asset name; the URL is derived from it.
///
/// # Examples
///
/// ```
/// use desktop_packager::runtime::asset::ReleaseAsset;
///
/// let asset = ReleaseAsset::runtime("20250918", "3.12.11", "x86_64-unknown-linux-gnu");
/// assert_eq!(
///     asset.name(),
///     "cpython-3.12.11+20250918-x86_64-unknown-linux-gnu-install_only_stripped.tar.gz"
/// );
/// assert!(asset.url().starts_with("https://github.com/astral-sh/python-build-standalone/"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseAsset {
    release: String,
    name: String,
    url: String,
}

impl ReleaseAsset {
    /// Describe the runtime archive for a release, version, and target.
    #[must_use]
    pub fn runtime(release: &str, version: &str, target: &str) -> Self {
        let name = format!("cpython-{version}+{release}-{target}-{ASSET_FLAVOUR}{ASSET_EXTENSION}");
        let url = join_segments(
            DOWNLOAD_BASE,
            &[DISTRIBUTION_REPO, "releases", "download", release, &name],
        );
        Self {
            release: release.to_owned(),
            name,
            url,
        }
    }

    /// Return the release tag this asset belongs to.
    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Return the asset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the download URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the release-metadata API URL for this asset's release.
    #[must_use]
    pub fn metadata_url(&self) -> String {
        join_segments(
            API_BASE,
            &[DISTRIBUTION_REPO, "releases", "tags", &self.release],
        )
    }
}

impl fmt::Display for ReleaseAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Append `segments` to `base`, percent-encoding each one.
///
/// A segment containing `/` (the `owner/repo` pair) is split first so the
/// separator survives.
fn join_segments(base: &str, segments: &[&str]) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return format!("{base}/{}", segments.join("/"));
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments {
            path.extend(segment.split('/'));
        }
    }
    url.into()
}
