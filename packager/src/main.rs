//! Desktop packager CLI entrypoint.
//!
//! Dispatches each subcommand to the library. Machine-readable results go to
//! stdout; progress, warnings, and errors go to stderr.

use clap::Parser;
use desktop_packager::build_config::render_build_config;
use desktop_packager::bundle_name::{resolve_bundle_name, write_step_outputs};
use desktop_packager::cli::{
    AppBundleNameArgs, Cli, Command, FetchRuntimeArgs, ValidateArtifactsArgs,
};
use desktop_packager::env::{EnvSource, ProcessEnv};
use desktop_packager::error::{PackagerError, Result};
use desktop_packager::output::write_stderr_line;
use desktop_packager::project::{read_project_version, requires_python_report};
use desktop_packager::runtime::pipeline::{AcquisitionOptions, acquire_runtime};
use desktop_packager::runtime::request::RuntimeRequest;
use desktop_packager::updater::duplicates::DuplicateGuard;
use desktop_packager::updater::manifest::generate_manifest;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::FetchRuntime(args) => fetch_runtime(args, &ProcessEnv, stdout, stderr),
        Command::UpdaterManifest(args) => {
            generate_manifest(&args.job(), stderr)?;
            Ok(())
        }
        Command::ValidateArtifacts(args) => validate_artifacts(args, stdout),
        Command::RenderBuildConfig(args) => {
            render_build_config(&args.output, &args.settings(), stderr)?;
            Ok(())
        }
        Command::ProjectVersion(args) => {
            let version = read_project_version(&args.path)?;
            write_stdout_line(stdout, version)
        }
        Command::RequiresPython(args) => {
            let report = requires_python_report(&args.path);
            write_stdout_line(stdout, report.to_json()?)
        }
        Command::AppBundleName(args) => app_bundle_name(args, stdout),
    }
}

/// Acquires the runtime and prints the variables later build steps consume.
fn fetch_runtime(
    args: &FetchRuntimeArgs,
    env: &dyn EnvSource,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let request = RuntimeRequest::resolve(env, &args.overrides())?;
    let options = AcquisitionOptions {
        quiet: args.quiet,
        ..AcquisitionOptions::default()
    };
    let acquired = acquire_runtime(&request, options, stderr)?;
    write_stdout_line(
        stdout,
        format!("ASTRBOT_DESKTOP_CPYTHON_HOME={}", acquired.install_dir),
    )?;
    write_stdout_line(
        stdout,
        format!("ASTRBOT_DESKTOP_CPYTHON_ASSET={}", acquired.asset_name),
    )
}

fn validate_artifacts(args: &ValidateArtifactsArgs, stdout: &mut dyn Write) -> Result<()> {
    DuplicateGuard.check(&args.root)?;
    write_stdout_line(stdout, "No duplicate artifact filenames detected.")
}

fn app_bundle_name(args: &AppBundleNameArgs, stdout: &mut dyn Write) -> Result<()> {
    let resolved = resolve_bundle_name(&args.config, args.name_override().as_ref())?;
    write_stdout_line(stdout, &resolved)?;
    if let Some(path) = &args.github_output {
        write_step_outputs(path, &resolved)?;
    }
    Ok(())
}

fn write_stdout_line(stdout: &mut dyn Write, message: impl std::fmt::Display) -> Result<()> {
    writeln!(stdout, "{message}").map_err(|source| PackagerError::WriteFailed { source })
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
