use std::fs;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use metadata_indexer_core::artifact::write_code_payload;
use metadata_indexer_core::config::{ARTIFACT_PATH_ENV, DEFAULT_ARTIFACT_PATH};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the S3 metadata indexer workspace",
    long_about = "A unified CLI for packaging the indexer function, provisioning and\n\
                  tearing down the pipeline, and running CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the indexer binary and package it as the deployable zip artifact
    Package {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Package the indexer, then create or update every pipeline resource
    Provision {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Delete every pipeline resource
    #[command(alias = "teardown")]
    Cleanup,
    /// Show the observed state of every pipeline resource
    Status,
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Compilation target triple for the function binary
    #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
    target: String,
    /// Build profile used for the binary
    #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
    profile: BuildProfile,
    /// Where the zip artifact is written
    #[arg(long, env = ARTIFACT_PATH_ENV, default_value = DEFAULT_ARTIFACT_PATH)]
    output: String,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Unit and integration tests only
    Test,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

const LAMBDA_PACKAGE: &str = "metadata_indexer_lambda";
const INDEXER_BIN: &str = "metadata_indexer";
const PIPELINE_BIN: &str = "pipeline";

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

/// `pipeline` reads its artifact path from the environment, so a custom
/// `--output` has to travel with the command.
fn pipeline_command(command: &str, artifact: Option<&str>) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "-p", LAMBDA_PACKAGE, "--bin", PIPELINE_BIN, "--", command]);
    if let Some(path) = artifact {
        cmd.env(ARTIFACT_PATH_ENV, path);
    }
    cmd
}

fn run_pipeline(command: &str, artifact: Option<&str>) {
    let mut cmd = pipeline_command(command, artifact);
    let env_prefix = artifact
        .map(|path| format!("{ARTIFACT_PATH_ENV}={path} "))
        .unwrap_or_default();
    eprintln!("+ {env_prefix}cargo run -p {LAMBDA_PACKAGE} --bin {PIPELINE_BIN} -- {command}");
    let status = cmd.status().expect("failed to execute cargo");
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_indexer(build: &BuildArgs) {
    ensure_rust_target_installed(&build.target);
    ensure_c_linker_available(&build.target);

    step("Build indexer function binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        build.target.as_str(),
        "--bin",
        INDEXER_BIN,
    ];
    if let Some(flag) = build.profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package function zip artifact");
    let binary_path = Path::new("target")
        .join(&build.target)
        .join(build.profile.dir_name())
        .join(binary_name(INDEXER_BIN, &build.target));
    if !binary_path.exists() {
        panic!("expected indexer binary at '{}'", binary_path.display());
    }

    let binary = fs::read(&binary_path).expect("failed to read indexer binary");
    let zip_path = Path::new(&build.output);
    if let Err(error) = write_code_payload(&binary, zip_path) {
        panic!("failed to package '{}': {error}", zip_path.display());
    }

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

/// Cross-building the function from a non-Linux host needs a Linux linker.
fn ensure_c_linker_available(target: &str) {
    if cfg!(target_os = "linux") || !target.ends_with("unknown-linux-gnu") {
        return;
    }

    let env_override_keys = [
        format!("CARGO_TARGET_{}_LINKER", target.replace('-', "_").to_uppercase()),
        format!("CC_{}", target.replace('-', "_")),
        "CC".to_string(),
    ];
    for key in env_override_keys {
        if let Ok(value) = std::env::var(&key) {
            let candidate = value.trim();
            if !candidate.is_empty() && tool_works(candidate) {
                return;
            }
        }
    }

    let canonical = format!("{}-linux-gnu-gcc", target.split('-').next().unwrap_or("x86_64"));
    if tool_works(&canonical) {
        return;
    }

    panic!(
        "missing C cross-linker for target `{target}`. install `{canonical}` (or set CARGO_TARGET_<TRIPLE>_LINKER) before running `cargo run -p xtask -- package`."
    );
}

fn tool_works(program: &str) -> bool {
    let mut parts = program.split_whitespace();
    let Some(bin) = parts.next() else {
        return false;
    };
    let args: Vec<&str> = parts.collect();

    Command::new(bin)
        .args(&args)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_test() {
    step("Test metadata_indexer_core");
    run_cargo(&["test", "-p", "metadata_indexer_core"]);

    step("Test metadata_indexer_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    ci_test();
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { build } => package_indexer(&build),
        Commands::Provision { build } => {
            package_indexer(&build);
            step("Provision pipeline");
            run_pipeline("provision", Some(build.output.as_str()));
        }
        Commands::Cleanup => {
            step("Tear down pipeline");
            run_pipeline("cleanup", None);
        }
        Commands::Status => run_pipeline("status", None),
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Test => ci_test(),
            }
            eprintln!("\nCI job passed.");
        }
    }
}
