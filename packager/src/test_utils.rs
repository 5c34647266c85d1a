//! Shared test utilities for the packager crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::retry::Sleeper;
use crate::runtime::probe::CommandExecutor;
use crate::runtime::transport::{ReleaseTransport, TransportError};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

/// Return the lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Render a release-metadata document listing a single asset.
#[must_use]
pub fn release_metadata_json(asset_name: &str, digest: &str) -> String {
    serde_json::json!({
        "tag_name": "20250918",
        "assets": [
            { "name": "unrelated.tar.gz", "digest": format!("sha256:{}", "0".repeat(64)) },
            { "name": asset_name, "digest": digest },
        ],
    })
    .to_string()
}

/// One entry in a test archive.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    /// A directory.
    Dir(&'static str),
    /// A regular file with contents and Unix mode.
    File(&'static str, Vec<u8>, u32),
    /// A symbolic link pointing at a relative target.
    Symlink(&'static str, &'static str),
}

/// Write a gzip-compressed tar archive containing `entries` to `path`.
///
/// Headers carry a fixed modification time so archives are reproducible.
///
/// # Errors
///
/// Returns an I/O error if the archive cannot be written.
pub fn write_tar_gz(path: &Path, entries: &[ArchiveEntry]) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        match entry {
            ArchiveEntry::Dir(name) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, name, io::empty())?;
            }
            ArchiveEntry::File(name, contents, mode) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(*mode);
                header.set_size(contents.len() as u64);
                builder.append_data(&mut header, name, contents.as_slice())?;
            }
            ArchiveEntry::Symlink(name, target) => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder.append_link(&mut header, name, target)?;
            }
        }
    }
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Entries of a minimal runtime archive with the expected layout.
#[must_use]
pub fn runtime_archive_entries() -> Vec<ArchiveEntry> {
    vec![
        ArchiveEntry::Dir("python/"),
        ArchiveEntry::Dir("python/bin/"),
        ArchiveEntry::File(
            "python/bin/python3.12",
            b"#!/bin/sh\necho 'Python 3.12.11'\n".to_vec(),
            0o755,
        ),
        ArchiveEntry::Symlink("python/bin/python3", "python3.12"),
        ArchiveEntry::Dir("python/lib/"),
        ArchiveEntry::File("python/lib/ssl.py", b"# ssl\n".to_vec(), 0o644),
    ]
}

/// Scripted response to a transport call.
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    /// Succeed with the given payload.
    Ok(T),
    /// Fail with an HTTP status.
    Status(u16),
    /// Fail before any response arrives.
    Unreachable,
}

/// A [`ReleaseTransport`] that replays scripted responses in order and
/// records every request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    metadata: RefCell<VecDeque<Scripted<String>>>,
    downloads: RefCell<VecDeque<Scripted<Vec<u8>>>>,
    requests: RefCell<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    /// Create a transport with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a metadata response.
    #[must_use]
    pub fn with_metadata(self, response: Scripted<String>) -> Self {
        self.metadata.borrow_mut().push_back(response);
        self
    }

    /// Queue a download response.
    #[must_use]
    pub fn with_download(self, response: Scripted<Vec<u8>>) -> Self {
        self.downloads.borrow_mut().push_back(response);
        self
    }

    /// Return every `(url, token)` pair requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.borrow().clone()
    }

    /// Return how many downloads were attempted.
    #[must_use]
    pub fn download_attempts(&self) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(url, _)| url.contains("/releases/download/"))
            .count()
    }

    fn failure(url: &str, response: Scripted<()>) -> TransportError {
        match response {
            Scripted::Status(status) => TransportError::Status {
                url: url.to_owned(),
                status,
            },
            Scripted::Ok(()) | Scripted::Unreachable => TransportError::Http {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            },
        }
    }
}

impl ReleaseTransport for ScriptedTransport {
    fn get_metadata(&self, url: &str, token: Option<&str>) -> Result<String, TransportError> {
        self.requests
            .borrow_mut()
            .push((url.to_owned(), token.map(str::to_owned)));
        match self.metadata.borrow_mut().pop_front() {
            Some(Scripted::Ok(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(Self::failure(url, Scripted::Status(status))),
            Some(Scripted::Unreachable) | None => Err(Self::failure(url, Scripted::Unreachable)),
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), TransportError> {
        self.requests.borrow_mut().push((url.to_owned(), None));
        match self.downloads.borrow_mut().pop_front() {
            Some(Scripted::Ok(bytes)) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            Some(Scripted::Status(status)) => {
                // Leave a partial body behind, as a real interrupted transfer would.
                std::fs::write(dest, b"partial")?;
                Err(Self::failure(url, Scripted::Status(status)))
            }
            Some(Scripted::Unreachable) | None => Err(Self::failure(url, Scripted::Unreachable)),
        }
    }
}

/// A [`Sleeper`] that records requested delays instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Return every delay requested so far.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a command `Output` with the given exit code and streams.
#[must_use]
pub fn command_output(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// A [`CommandExecutor`] that answers probe invocations by their first
/// argument and records each call.
#[derive(Debug, Default)]
pub struct StubExecutor {
    version: Option<Output>,
    ssl: Option<Output>,
    calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl StubExecutor {
    /// Create an executor where both probes succeed.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            version: Some(command_output(0, "Python 3.12.11\n", "")),
            ssl: Some(command_output(0, "", "")),
            calls: RefCell::default(),
        }
    }

    /// Replace the response to the version probe.
    #[must_use]
    pub fn with_version(mut self, output: Output) -> Self {
        self.version = Some(output);
        self
    }

    /// Replace the response to the TLS import probe.
    #[must_use]
    pub fn with_ssl(mut self, output: Output) -> Self {
        self.ssl = Some(output);
        self
    }

    /// Return every `(program, args)` invocation so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, program: &Path, args: &[&str]) -> io::Result<Output> {
        self.calls.borrow_mut().push((
            program.to_path_buf(),
            args.iter().map(|a| (*a).to_owned()).collect(),
        ));
        let response = match args.first() {
            Some(&"-V") => self.version.clone(),
            _ => self.ssl.clone(),
        };
        response.ok_or_else(|| io::Error::other("no stubbed response"))
    }
}
