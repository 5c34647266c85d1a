//! CLI argument definitions for the desktop packager.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint so the argument types can be converted into
//! library inputs and tested without spawning the binary.

use crate::build_config::UpdaterSettings;
use crate::bundle_name::{DEFAULT_OVERRIDE_SOURCE, NameOverride};
use crate::runtime::request::RuntimeOverrides;
use crate::updater::manifest::{DuplicateKeyPolicy, ManifestJob, ManifestSettings};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Release packaging tools for the AstrBot desktop bundle.
#[derive(Parser, Debug)]
#[command(name = "desktop-packager")]
#[command(version, about)]
#[command(long_about = concat!(
    "Release packaging tools for the AstrBot desktop bundle.\n\n",
    "The packager acquires the standalone Python runtime embedded in the ",
    "desktop application, verifying the archive against the digest published ",
    "in the upstream release metadata before anything is installed. It also ",
    "assembles the updater manifest from the bundles produced by the platform ",
    "build jobs and guards the merged artifact tree against name collisions.\n\n",
    "Diagnostics are written to stderr. Set RUST_LOG=debug for internal detail.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT (fetch-runtime):\n",
    "  PYTHON_BUILD_STANDALONE_RELEASE   Upstream release tag\n",
    "  PYTHON_BUILD_STANDALONE_VERSION   Python version\n",
    "  PYTHON_BUILD_STANDALONE_TARGET    Target triple\n",
    "  RUNNER_TEMP_DIR, RUNNER_TEMP      Scratch root (first non-empty wins)\n",
    "  GITHUB_TOKEN, GH_TOKEN, ASTRBOT_GITHUB_TOKEN\n",
    "                                    Optional release metadata token\n\n",
    "EXAMPLES:\n",
    "  Acquire the runtime for the current job:\n",
    "    $ desktop-packager fetch-runtime\n\n",
    "  Build the updater manifest after merging artifacts:\n",
    "    $ desktop-packager validate-artifacts release-artifacts\n",
    "    $ desktop-packager updater-manifest --root release-artifacts \\\n",
    "        --repository AstrBotDevs/AstrBot-desktop --release-tag v4.19.0 \\\n",
    "        --version 4.19.0 --output release-artifacts/latest.json\n\n",
    "For more information, see: https://github.com/AstrBotDevs/AstrBot-desktop",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download, verify, and install the embedded Python runtime.
    FetchRuntime(FetchRuntimeArgs),

    /// Generate the updater manifest from signed bundles.
    UpdaterManifest(UpdaterManifestArgs),

    /// Fail when any artifact filename occurs more than once.
    ValidateArtifacts(ValidateArtifactsArgs),

    /// Write the build-config overlay carrying updater settings.
    RenderBuildConfig(RenderBuildConfigArgs),

    /// Print `project.version` from a project manifest.
    ProjectVersion(ManifestPathArgs),

    /// Print `project.requires-python` from a project manifest as JSON.
    RequiresPython(ManifestPathArgs),

    /// Resolve the application bundle name for macOS packaging.
    AppBundleName(AppBundleNameArgs),
}

/// Arguments for `fetch-runtime`.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchRuntimeArgs {
    /// Upstream release tag [env: PYTHON_BUILD_STANDALONE_RELEASE].
    #[arg(long, value_name = "TAG")]
    pub release: Option<String>,

    /// Python version [env: PYTHON_BUILD_STANDALONE_VERSION].
    #[arg(long, value_name = "VERSION")]
    pub python_version: Option<String>,

    /// Target triple [env: PYTHON_BUILD_STANDALONE_TARGET].
    #[arg(long, value_name = "TRIPLE")]
    pub target: Option<String>,

    /// Scratch root [env: RUNNER_TEMP_DIR, RUNNER_TEMP].
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

impl FetchRuntimeArgs {
    /// Values that take precedence over the environment.
    #[must_use]
    pub fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            release: self.release.clone(),
            version: self.python_version.clone(),
            target: self.target.clone(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

/// Arguments for `updater-manifest`.
#[derive(Args, Debug, Clone, Default)]
pub struct UpdaterManifestArgs {
    /// Root directory containing release artifacts.
    #[arg(long, value_name = "DIR")]
    pub root: Utf8PathBuf,

    /// Hosting repository, e.g. AstrBotDevs/AstrBot-desktop.
    #[arg(long, value_name = "OWNER/NAME")]
    pub repository: String,

    /// Release tag, e.g. v4.19.0.
    #[arg(long, value_name = "TAG")]
    pub release_tag: String,

    /// Application version, e.g. 4.19.0.
    #[arg(long = "version", value_name = "VERSION")]
    pub app_version: String,

    /// Output file for the manifest.
    #[arg(long, value_name = "FILE")]
    pub output: Utf8PathBuf,

    /// Release notes [default: "Release <tag>"].
    #[arg(long, value_name = "TEXT")]
    pub notes: Option<String>,

    /// Fail when a bundle's version differs from --version.
    #[arg(long)]
    pub strict_version_match: bool,

    /// Let a later bundle replace an earlier one for the same platform.
    #[arg(long)]
    pub allow_platform_override: bool,

    /// Suppress progress output (warnings and errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

impl UpdaterManifestArgs {
    /// The manifest run described by these arguments.
    #[must_use]
    pub fn job(&self) -> ManifestJob {
        let duplicate_policy = if self.allow_platform_override {
            DuplicateKeyPolicy::LastWins
        } else {
            DuplicateKeyPolicy::Reject
        };
        ManifestJob {
            root: self.root.clone(),
            output: self.output.clone(),
            settings: ManifestSettings {
                repository: self.repository.clone(),
                release_tag: self.release_tag.clone(),
                version: self.app_version.clone(),
                notes: self.notes.clone(),
                strict_version_match: self.strict_version_match,
                duplicate_policy,
            },
            quiet: self.quiet,
        }
    }
}

/// Arguments for `validate-artifacts`.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArtifactsArgs {
    /// Merged artifact directory.
    #[arg(value_name = "DIR", default_value = "release-artifacts")]
    pub root: Utf8PathBuf,
}

/// Arguments for `render-build-config`.
#[derive(Args, Debug, Clone, Default)]
pub struct RenderBuildConfigArgs {
    /// Output file for the overlay.
    #[arg(long, value_name = "FILE")]
    pub output: Utf8PathBuf,

    /// Update feed URL [default: the project's latest.json].
    #[arg(long, value_name = "URL")]
    pub updater_endpoint: Option<String>,

    /// Updater public key; omitted when empty.
    #[arg(long, value_name = "KEY")]
    pub updater_pubkey: Option<String>,

    /// Do not produce signed updater bundles.
    #[arg(long)]
    pub disable_updater_artifacts: bool,
}

impl RenderBuildConfigArgs {
    /// The updater settings for the overlay.
    #[must_use]
    pub fn settings(&self) -> UpdaterSettings {
        UpdaterSettings {
            endpoint: self.updater_endpoint.clone(),
            pubkey: self.updater_pubkey.clone(),
            disable_artifacts: self.disable_updater_artifacts,
        }
    }
}

/// A single project manifest path.
#[derive(Args, Debug, Clone, Default)]
pub struct ManifestPathArgs {
    /// Path to pyproject.toml.
    #[arg(value_name = "FILE")]
    pub path: Utf8PathBuf,
}

/// Arguments for `app-bundle-name`.
#[derive(Args, Debug, Clone)]
pub struct AppBundleNameArgs {
    /// Path to the bundler's JSON config.
    #[arg(long, value_name = "FILE")]
    pub config: Utf8PathBuf,

    /// Explicit bundle name; ignored when blank.
    #[arg(long, value_name = "NAME", default_value = "")]
    pub override_name: String,

    /// Source label reported for --override-name.
    #[arg(long, value_name = "LABEL", default_value = DEFAULT_OVERRIDE_SOURCE)]
    pub override_source: String,

    /// Append step outputs to this file.
    #[arg(long, value_name = "FILE")]
    pub github_output: Option<PathBuf>,
}

impl AppBundleNameArgs {
    /// The override, when a non-blank name was given.
    #[must_use]
    pub fn name_override(&self) -> Option<NameOverride> {
        (!self.override_name.trim().is_empty()).then(|| NameOverride {
            name: self.override_name.clone(),
            source: self.override_source.clone(),
        })
    }
}

impl Default for AppBundleNameArgs {
    /// Creates arguments with an empty config path and no override.
    fn default() -> Self {
        Self {
            config: Utf8PathBuf::new(),
            override_name: String::new(),
            override_source: DEFAULT_OVERRIDE_SOURCE.to_owned(),
            github_output: None,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
