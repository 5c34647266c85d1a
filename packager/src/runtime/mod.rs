//! Runtime archive acquisition.
//!
//! Downloads the standalone Python runtime that is embedded in the desktop
//! bundle, verifies it against a digest published in independent release
//! metadata, and installs it into a fixed directory. The stages run strictly
//! in order and no stage after verification is reachable without it passing.
//!
//! # Sub-modules
//!
//! - [`asset`] - Release asset naming and URL derivation (`ReleaseAsset`).
//! - [`digest`] - SHA-256 digests, streaming hashing, and verification.
//! - [`extraction`] - Archive extraction and layout validation.
//! - [`fetch`] - Archive download with bounded retry.
//! - [`install`] - Replacement of the install directory.
//! - [`metadata`] - Trusted digest resolution from release metadata.
//! - [`pipeline`] - Stage orchestration.
//! - [`probe`] - Smoke checks against the installed interpreter.
//! - [`request`] - Acquisition inputs resolved from the environment.
//! - [`transport`] - HTTP transport trait and `ureq` implementation.

pub mod asset;
pub mod digest;
pub mod extraction;
pub mod fetch;
pub mod install;
pub mod metadata;
pub mod pipeline;
pub mod probe;
pub mod request;
pub mod transport;
