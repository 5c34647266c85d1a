//! Updater manifest synthesis.
//!
//! Turns the merged output of the per-platform build jobs into the JSON
//! manifest consumed by the desktop auto-updater, and guards the merged tree
//! against filename collisions before that happens.
//!
//! # Sub-modules
//!
//! - [`classify`] - Filename to platform classification.
//! - [`duplicates`] - Duplicate basename detection.
//! - [`manifest`] - Manifest model, assembly, and writing.
//! - [`pairing`] - Detached signature lookup.
//! - [`scanner`] - Bundle discovery under an artifact root.

pub mod classify;
pub mod duplicates;
pub mod manifest;
pub mod pairing;
pub mod scanner;
