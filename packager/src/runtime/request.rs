//! Acquisition inputs resolved from flags and the environment.

use super::asset::ReleaseAsset;
use crate::env::{
    EnvChain, EnvSource, METADATA_TOKEN_CHAIN, MissingEnv, RUNTIME_RELEASE_CHAIN,
    RUNTIME_TARGET_CHAIN, RUNTIME_VERSION_CHAIN, SCRATCH_DIR_CHAIN,
};
use camino::{Utf8Path, Utf8PathBuf};

/// Directory name of the installed runtime under the scratch root.
pub const INSTALL_DIR_NAME: &str = "astrbot-cpython-runtime";

/// Directory name of the extraction staging area under the scratch root.
pub const STAGING_DIR_NAME: &str = "astrbot-cpython-runtime-extract";

/// Values supplied on the command line that take precedence over the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOverrides {
    /// Upstream release tag.
    pub release: Option<String>,
    /// Python version.
    pub version: Option<String>,
    /// Target triple.
    pub target: Option<String>,
    /// Scratch root.
    pub scratch_dir: Option<Utf8PathBuf>,
}

/// Everything needed to run the acquisition pipeline once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRequest {
    asset: ReleaseAsset,
    scratch_dir: Utf8PathBuf,
    token: Option<String>,
}

impl RuntimeRequest {
    /// Build a request from explicit parts.
    #[must_use]
    pub const fn new(asset: ReleaseAsset, scratch_dir: Utf8PathBuf, token: Option<String>) -> Self {
        Self {
            asset,
            scratch_dir,
            token,
        }
    }

    /// Resolve a request, preferring non-empty `overrides` over `env`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEnv`] for the first required input that neither the
    /// overrides nor the environment supply.
    pub fn resolve(env: &dyn EnvSource, overrides: &RuntimeOverrides) -> Result<Self, MissingEnv> {
        let release = pick(overrides.release.as_deref(), RUNTIME_RELEASE_CHAIN, env)?;
        let version = pick(overrides.version.as_deref(), RUNTIME_VERSION_CHAIN, env)?;
        let target = pick(overrides.target.as_deref(), RUNTIME_TARGET_CHAIN, env)?;
        let scratch_dir = match overrides.scratch_dir.clone() {
            Some(dir) if !dir.as_str().trim().is_empty() => dir,
            _ => Utf8PathBuf::from(SCRATCH_DIR_CHAIN.require(env)?.value),
        };
        let token = METADATA_TOKEN_CHAIN.resolve(env).map(|resolved| {
            log::debug!("using release metadata token from {}", resolved.source);
            resolved.value
        });

        Ok(Self::new(
            ReleaseAsset::runtime(&release, &version, &target),
            scratch_dir,
            token,
        ))
    }

    /// The asset to acquire.
    #[must_use]
    pub const fn asset(&self) -> &ReleaseAsset {
        &self.asset
    }

    /// Bearer token for the metadata endpoint, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The scratch root all working paths live under.
    #[must_use]
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch_dir
    }

    /// Final install directory.
    #[must_use]
    pub fn install_dir(&self) -> Utf8PathBuf {
        self.scratch_dir.join(INSTALL_DIR_NAME)
    }

    /// Extraction staging directory.
    #[must_use]
    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.scratch_dir.join(STAGING_DIR_NAME)
    }

    /// Download destination for the archive.
    #[must_use]
    pub fn archive_path(&self) -> Utf8PathBuf {
        self.scratch_dir.join(self.asset.name())
    }
}

fn pick(explicit: Option<&str>, chain: EnvChain, env: &dyn EnvSource) -> Result<String, MissingEnv> {
    match explicit.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => chain.require(env).map(|resolved| resolved.value),
    }
}
