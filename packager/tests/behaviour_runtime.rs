//! Behaviour tests for runtime acquisition.
//!
//! The scenarios drive the full pipeline with a scripted transport, a real
//! tar.gz extractor, and a stubbed interpreter.

use camino::Utf8PathBuf;
use desktop_packager::retry::RetryPolicy;
use desktop_packager::runtime::asset::{ARCHIVE_ROOT_DIR, ReleaseAsset};
use desktop_packager::runtime::extraction::TarGzExtractor;
use desktop_packager::runtime::pipeline::{
    AcquiredRuntime, AcquisitionDeps, AcquisitionError, AcquisitionOptions, acquire_runtime_with,
};
use desktop_packager::runtime::request::RuntimeRequest;
use desktop_packager::test_utils::{
    RecordingSleeper, Scripted, ScriptedTransport, StubExecutor, command_output,
    release_metadata_json, runtime_archive_entries, sha256_hex, write_tar_gz,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use std::time::Duration;

const PREVIOUS_MARKER: &str = "previous.txt";

struct RuntimeWorld {
    _temp: tempfile::TempDir,
    request: RuntimeRequest,
    archive: Vec<u8>,
    metadata: Option<String>,
    downloads: Vec<Scripted<Vec<u8>>>,
    executor: StubExecutor,
    download_attempts: usize,
    result: Option<Result<AcquiredRuntime, AcquisitionError>>,
}

#[fixture]
fn world() -> RuntimeWorld {
    let temp = tempfile::tempdir().expect("temp dir");
    let archive_path = temp.path().join("fixture.tar.gz");
    write_tar_gz(&archive_path, &runtime_archive_entries()).expect("write archive");
    let archive = fs::read(&archive_path).expect("read archive");
    let scratch = Utf8PathBuf::try_from(temp.path().join("runner")).expect("UTF-8 path");
    let asset = ReleaseAsset::runtime("20250918", "3.12.11", "x86_64-unknown-linux-gnu");
    RuntimeWorld {
        _temp: temp,
        request: RuntimeRequest::new(asset, scratch, None),
        archive,
        metadata: None,
        downloads: Vec::new(),
        executor: StubExecutor::healthy(),
        download_attempts: 0,
        result: None,
    }
}

fn metadata_for(world: &RuntimeWorld, digest: &str) -> String {
    release_metadata_json(world.request.asset().name(), digest)
}

#[given("release metadata publishing the archive digest")]
fn given_matching_metadata(world: &mut RuntimeWorld) {
    let digest = format!("sha256:{}", sha256_hex(&world.archive));
    world.metadata = Some(metadata_for(world, &digest));
}

#[given("release metadata publishing a different digest")]
fn given_mismatched_metadata(world: &mut RuntimeWorld) {
    let digest = format!("sha256:{}", sha256_hex(b"some other archive"));
    world.metadata = Some(metadata_for(world, &digest));
}

#[given("release metadata without a digest for the asset")]
fn given_metadata_without_digest(world: &mut RuntimeWorld) {
    world.metadata = Some(metadata_for(world, "md5:d41d8cd98f00b204e9800998ecf8427e"));
}

#[given("a download that succeeds")]
fn given_download_succeeds(world: &mut RuntimeWorld) {
    world.downloads.push(Scripted::Ok(world.archive.clone()));
}

#[given("a download that fails {failures} times before succeeding")]
fn given_flaky_download(world: &mut RuntimeWorld, failures: usize) {
    world
        .downloads
        .extend(std::iter::repeat_n(Scripted::Status(502), failures));
    world.downloads.push(Scripted::Ok(world.archive.clone()));
}

#[given("a previously installed runtime")]
fn given_previous_install(world: &mut RuntimeWorld) {
    let install_dir = world.request.install_dir();
    fs::create_dir_all(&install_dir).expect("install dir");
    fs::write(install_dir.join(PREVIOUS_MARKER), b"previous runtime").expect("marker");
}

#[given("an interpreter that cannot import ssl")]
fn given_broken_ssl(world: &mut RuntimeWorld) {
    world.executor = StubExecutor::healthy().with_ssl(command_output(
        1,
        "",
        "ModuleNotFoundError: No module named '_ssl'\n",
    ));
}

#[when("the runtime is acquired")]
fn when_runtime_acquired(world: &mut RuntimeWorld) {
    let mut transport = ScriptedTransport::new();
    if let Some(body) = world.metadata.take() {
        transport = transport.with_metadata(Scripted::Ok(body));
    }
    for download in world.downloads.drain(..) {
        transport = transport.with_download(download);
    }
    let sleeper = RecordingSleeper::default();
    let extractor = TarGzExtractor::new(ARCHIVE_ROOT_DIR);
    let deps = AcquisitionDeps {
        transport: &transport,
        sleeper: &sleeper,
        extractor: &extractor,
        executor: &world.executor,
    };
    let options = AcquisitionOptions {
        policy: RetryPolicy::new(3, Duration::from_millis(1)),
        quiet: true,
    };
    let result = acquire_runtime_with(&world.request, &deps, options, &mut std::io::sink());
    world.download_attempts = transport.download_attempts();
    world.result = Some(result);
}

#[then("acquisition succeeds")]
fn then_acquisition_succeeds(world: &mut RuntimeWorld) {
    let result = world.result.as_ref().expect("result set");
    assert!(result.is_ok(), "expected success, got {result:?}");
}

#[then("acquisition fails with \"{fragment}\"")]
fn then_acquisition_fails(world: &mut RuntimeWorld, fragment: String) {
    match world.result.as_ref().expect("result set") {
        Ok(acquired) => panic!("expected failure, got {acquired:?}"),
        Err(err) => {
            let message = err.to_string();
            assert!(
                message.contains(&fragment),
                "expected error to mention '{fragment}', got: {message}"
            );
        }
    }
}

#[then("the install directory contains the interpreter")]
fn then_interpreter_installed(world: &mut RuntimeWorld) {
    let bin = world.request.install_dir().join("bin");
    assert!(bin.join("python3.12").is_file());
    assert!(fs::symlink_metadata(bin.join("python3")).is_ok());
}

#[then("the scratch directory holds no archive or staging tree")]
fn then_scratch_cleaned(world: &mut RuntimeWorld) {
    assert!(!world.request.archive_path().exists());
    assert!(!world.request.staging_dir().exists());
}

#[then("the previous runtime is untouched")]
fn then_previous_untouched(world: &mut RuntimeWorld) {
    let marker = world.request.install_dir().join(PREVIOUS_MARKER);
    assert_eq!(fs::read(marker).expect("marker kept"), b"previous runtime");
    assert!(!world.request.install_dir().join("bin").exists());
}

#[then("the interpreter was never probed")]
fn then_not_probed(world: &mut RuntimeWorld) {
    assert!(world.executor.calls().is_empty());
}

#[then("no download was attempted")]
fn then_no_download(world: &mut RuntimeWorld) {
    assert_eq!(world.download_attempts, 0);
}

#[then("{count} download attempts were made")]
fn then_download_attempts(world: &mut RuntimeWorld, count: usize) {
    assert_eq!(world.download_attempts, count);
}

#[scenario(
    path = "tests/features/runtime_acquisition.feature",
    name = "Verified archive is installed and probed"
)]
fn scenario_verified_install(world: RuntimeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/runtime_acquisition.feature",
    name = "Tampered archive leaves the previous runtime in place"
)]
fn scenario_tampered_archive(world: RuntimeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/runtime_acquisition.feature",
    name = "Metadata without a digest stops before downloading"
)]
fn scenario_missing_digest(world: RuntimeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/runtime_acquisition.feature",
    name = "Transient download failures are retried"
)]
fn scenario_retried_download(world: RuntimeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/runtime_acquisition.feature",
    name = "A failing interpreter is reported"
)]
fn scenario_failing_interpreter(world: RuntimeWorld) {
    let _ = world;
}
