//! Smoke checks against an installed runtime.
//!
//! The probe is the last gate before a runtime reaches the shipped bundle:
//! it locates the interpreter by a fixed candidate list and runs a version
//! query plus a TLS import. Either failing is fatal.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Upper bound on a single probe invocation.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Interpreter locations tried in order, relative to the install root.
#[cfg(windows)]
pub const BINARY_CANDIDATES: &[&str] = &["python.exe", "Scripts/python.exe"];

/// Interpreter locations tried in order, relative to the install root.
#[cfg(not(windows))]
pub const BINARY_CANDIDATES: &[&str] = &["bin/python3", "bin/python"];

const VERSION_ARGS: &[&str] = &["-V"];
const TLS_ARGS: &[&str] = &["-c", "import ssl"];

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs `program` with `args` and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, including [`io::ErrorKind::TimedOut`].
    fn run(&self, program: &Path, args: &[&str]) -> io::Result<Output>;
}

/// Executes commands on the host system with a bounded wait.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Create an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(PROBE_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &Path, args: &[&str]) -> io::Result<Output> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Pipes are drained concurrently with the wait.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = child.wait_timeout(self.timeout)? else {
            if let Err(err) = child.kill().and_then(|()| child.wait().map(drop)) {
                log::debug!("failed to reap timed-out probe {}: {err}", program.display());
            }
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {} seconds", self.timeout.as_secs()),
            ));
        };

        Ok(Output {
            status,
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        })
    }
}

type PipeReader = thread::JoinHandle<io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> PipeReader {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut reader) = pipe {
            reader.read_to_end(&mut bytes)?;
        }
        Ok(bytes)
    })
}

fn collect(reader: PipeReader) -> io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| io::Error::other("probe output reader panicked"))?
}

/// Errors arising from probing an installed runtime.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// None of the candidate interpreter paths exist.
    #[error("runtime binary not found under {}: tried {}", .root.display(), .candidates.join(", "))]
    BinaryNotFound {
        /// The install root that was searched.
        root: PathBuf,
        /// The relative paths that were tried.
        candidates: Vec<String>,
    },

    /// A smoke invocation exited unsuccessfully.
    #[error("runtime {check} probe failed for {}: {diagnostics}", .binary.display())]
    ProbeFailed {
        /// Which check failed.
        check: &'static str,
        /// The interpreter that was run.
        binary: PathBuf,
        /// The captured diagnostic stream.
        diagnostics: String,
    },

    /// The interpreter could not be run at all.
    #[error("failed to run runtime binary {}: {source}", .binary.display())]
    Spawn {
        /// The interpreter that was run.
        binary: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Summary of a passing probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// The interpreter that was probed.
    pub binary: PathBuf,
    /// The reported version string, e.g. `Python 3.12.11`.
    pub version: String,
}

/// Runs the smoke checks through an injected [`CommandExecutor`].
pub struct RuntimeProbe<'a> {
    executor: &'a dyn CommandExecutor,
}

impl<'a> RuntimeProbe<'a> {
    /// Create a probe that runs commands with `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self { executor }
    }

    /// Locate the interpreter under `root` and run both smoke checks.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::BinaryNotFound`] when no candidate exists and
    /// [`ProbeError::ProbeFailed`] when a check exits unsuccessfully.
    pub fn probe(&self, root: &Path) -> Result<ProbeReport, ProbeError> {
        let binary = locate_binary(root)?;
        let version_output = self.check(&binary, "version", VERSION_ARGS)?;
        self.check(&binary, "ssl", TLS_ARGS)?;

        // Older interpreters print the version banner on stderr.
        let stdout = String::from_utf8_lossy(&version_output.stdout);
        let version = if stdout.trim().is_empty() {
            String::from_utf8_lossy(&version_output.stderr).trim().to_owned()
        } else {
            stdout.trim().to_owned()
        };
        log::debug!("runtime probe passed: {} ({version})", binary.display());
        Ok(ProbeReport { binary, version })
    }

    fn check(
        &self,
        binary: &Path,
        check: &'static str,
        args: &[&str],
    ) -> Result<Output, ProbeError> {
        let output = self
            .executor
            .run(binary, args)
            .map_err(|source| ProbeError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(ProbeError::ProbeFailed {
                check,
                binary: binary.to_path_buf(),
                diagnostics: diagnostics(&output),
            })
        }
    }
}

/// Return the first candidate interpreter that exists under `root`.
///
/// # Errors
///
/// Returns [`ProbeError::BinaryNotFound`] listing every candidate tried.
pub fn locate_binary(root: &Path) -> Result<PathBuf, ProbeError> {
    BINARY_CANDIDATES
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| ProbeError::BinaryNotFound {
            root: root.to_path_buf(),
            candidates: BINARY_CANDIDATES.iter().map(|c| (*c).to_owned()).collect(),
        })
}

/// Prefer stderr, then stdout, then the exit status.
fn diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_owned();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim().to_owned();
    }
    output
        .status
        .code()
        .map_or_else(|| "terminated by signal".to_owned(), |code| format!("exit={code}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StubExecutor, command_output};
    use rstest::{fixture, rstest};
    use std::fs;

    #[fixture]
    fn install_root() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("temp dir");
        let first = temp.path().join(BINARY_CANDIDATES.first().expect("candidate"));
        fs::create_dir_all(first.parent().expect("parent")).expect("bin dir");
        fs::write(&first, b"").expect("binary");
        temp
    }

    #[rstest]
    fn healthy_runtime_reports_version(install_root: tempfile::TempDir) {
        let executor = StubExecutor::healthy();
        let report = RuntimeProbe::new(&executor)
            .probe(install_root.path())
            .expect("probe passes");

        assert_eq!(report.version, "Python 3.12.11");
        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls.first().map(|(_, args)| args.clone()), Some(vec!["-V".to_owned()]));
        assert_eq!(
            calls.get(1).map(|(_, args)| args.clone()),
            Some(vec!["-c".to_owned(), "import ssl".to_owned()])
        );
    }

    #[rstest]
    fn version_falls_back_to_stderr(install_root: tempfile::TempDir) {
        let executor =
            StubExecutor::healthy().with_version(command_output(0, "", "Python 2.7.18\n"));
        let report = RuntimeProbe::new(&executor)
            .probe(install_root.path())
            .expect("probe passes");
        assert_eq!(report.version, "Python 2.7.18");
    }

    #[test]
    fn later_candidate_is_used_when_first_is_missing() {
        let temp = tempfile::tempdir().expect("temp dir");
        let last = temp.path().join(BINARY_CANDIDATES.last().expect("candidate"));
        fs::create_dir_all(last.parent().expect("parent")).expect("dir");
        fs::write(&last, b"").expect("binary");

        assert_eq!(locate_binary(temp.path()).expect("found"), last);
    }

    #[test]
    fn missing_binary_lists_candidates() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = locate_binary(temp.path()).expect_err("nothing installed");
        assert!(matches!(&err, ProbeError::BinaryNotFound { candidates, .. } if candidates.len() == 2));
    }

    #[rstest]
    #[case::stderr_wins(command_output(1, "out", " boom \n"), "boom")]
    #[case::stdout_fallback(command_output(1, "only stdout\n", ""), "only stdout")]
    #[case::exit_code(command_output(3, "", ""), "exit=3")]
    fn failing_version_probe_carries_diagnostics(
        install_root: tempfile::TempDir,
        #[case] output: Output,
        #[case] expected: &str,
    ) {
        let executor = StubExecutor::healthy().with_version(output);
        let err = RuntimeProbe::new(&executor)
            .probe(install_root.path())
            .expect_err("probe fails");

        assert!(
            matches!(&err, ProbeError::ProbeFailed { check: "version", diagnostics, .. } if diagnostics == expected),
            "unexpected error: {err:?}"
        );
        assert_eq!(executor.calls().len(), 1, "ssl check must not run");
    }

    #[rstest]
    fn failing_ssl_probe_is_fatal(install_root: tempfile::TempDir) {
        let executor = StubExecutor::healthy().with_ssl(command_output(
            1,
            "",
            "ModuleNotFoundError: No module named '_ssl'",
        ));
        let err = RuntimeProbe::new(&executor)
            .probe(install_root.path())
            .expect_err("probe fails");
        assert!(matches!(err, ProbeError::ProbeFailed { check: "ssl", .. }));
    }

    #[rstest]
    fn spawn_failure_is_reported(install_root: tempfile::TempDir) {
        let executor = StubExecutor::default();

        let err = RuntimeProbe::new(&executor)
            .probe(install_root.path())
            .expect_err("spawn fails");
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_runs_real_script() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("temp dir");
        let script = temp.path().join("fake-python");
        fs::write(&script, "#!/bin/sh\necho \"Python 3.12.11\"\n").expect("script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let output = SystemCommandExecutor::default()
            .run(&script, &["-V"])
            .expect("script runs");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Python 3.12.11");
    }

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        fs::create_dir_all(path.parent().expect("parent")).expect("script dir");
        fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("script");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_drains_output_larger_than_a_pipe() {
        let temp = tempfile::tempdir().expect("temp dir");
        let script = temp.path().join("noisy-python");
        write_script(&script, "head -c 200000 /dev/zero | tr '\\0' x >&2\nexit 1");

        let output = SystemCommandExecutor::with_timeout(Duration::from_secs(30))
            .run(&script, &["-V"])
            .expect("script finishes");
        assert_eq!(output.status.code(), Some(1));
        assert_eq!(output.stderr.len(), 200_000);
    }

    #[cfg(unix)]
    #[rstest]
    fn non_utf8_diagnostics_fail_the_probe(install_root: tempfile::TempDir) {
        let binary = install_root.path().join(BINARY_CANDIDATES.first().expect("candidate"));
        write_script(&binary, "printf 'caf\\351 boom' >&2\nexit 1");

        let executor = SystemCommandExecutor::default();
        let err = RuntimeProbe::new(&executor)
            .probe(install_root.path())
            .expect_err("probe fails");
        assert!(
            matches!(&err, ProbeError::ProbeFailed { check: "version", diagnostics, .. } if diagnostics == "caf\u{fffd} boom"),
            "unexpected error: {err:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_kills_hung_commands() {
        let err = SystemCommandExecutor::with_timeout(Duration::from_millis(100))
            .run(Path::new("/bin/sleep"), &["5"])
            .expect_err("times out");
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
