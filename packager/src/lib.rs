//! AstrBot desktop release packaging library.
//!
//! This crate provides the release-time tooling for the desktop bundle: it
//! acquires and verifies the embedded Python runtime archive, and it
//! synthesizes the auto-updater manifest from the artifacts produced by the
//! platform build jobs. It is used by the `desktop-packager` CLI binary and can
//! be consumed programmatically for testing.
//!
//! # Modules
//!
//! - [`build_config`] - Build-config overlay rendering for updater settings
//! - [`bundle_name`] - Application bundle name resolution
//! - [`cli`] - Command-line argument definitions
//! - [`env`] - Ordered environment-variable source chains
//! - [`error`] - Top-level error type
//! - [`output`] - Stderr helpers and CI step-output files
//! - [`project`] - Project manifest metadata reading
//! - [`retry`] - Retry policy shared by network components
//! - [`runtime`] - Runtime archive acquisition pipeline
//! - [`updater`] - Updater manifest synthesis pipeline

pub mod build_config;
pub mod bundle_name;
pub mod cli;
pub mod env;
pub mod error;
pub mod output;
pub mod project;
pub mod retry;
pub mod runtime;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod updater;
