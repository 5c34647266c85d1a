//! Output helpers for the packager CLI.
//!
//! Diagnostics go to stderr through [`write_stderr_line`], which is
//! best-effort: a failed write to the diagnostic stream is never itself an
//! error. Machine-readable values for CI runners are appended to a step-output
//! file with [`append_step_output`].

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Write one line to the diagnostic stream, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Append a `key`/`value` pair to a CI step-output file.
///
/// Values are written with a heredoc-style delimiter so multi-line values
/// survive intact:
///
/// ```text
/// key<<EOF_<random hex>
/// value
/// EOF_<random hex>
/// ```
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or written.
pub fn append_step_output(path: &Path, key: &str, value: &str) -> io::Result<()> {
    let marker = format!("EOF_{:032x}", rand::random::<u128>());
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write!(file, "{}", step_output_block(key, value, &marker))
}

/// Format a step-output block with an explicit delimiter.
fn step_output_block(key: &str, value: &str, marker: &str) -> String {
    format!("{key}<<{marker}\n{value}\n{marker}\n")
}
