use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metadata_indexer_core::artifact::read_code_payload;
use metadata_indexer_core::config::PipelineConfig;
use metadata_indexer_core::observer::TracingObserver;
use metadata_indexer_core::orchestrator::Orchestrator;
use metadata_indexer_core::readiness::ThreadSleeper;
use metadata_indexer_lambda::adapters::aws::AwsPorts;
use metadata_indexer_lambda::telemetry;

#[derive(Parser)]
#[command(
    name = "pipeline",
    about = "Provision or tear down the S3 metadata indexing pipeline",
    long_about = "Creates, inspects and deletes the role, table, bucket, function and\n\
                  upload trigger of the metadata indexing pipeline. Names and region\n\
                  come from INDEXER_* environment variables."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or reuse every resource and deploy the packaged indexer
    Provision,
    /// Delete every resource in reverse creation order
    #[command(alias = "teardown")]
    Cleanup,
    /// Show the observed state of every resource
    Status,
}

fn provision(config: &PipelineConfig) -> anyhow::Result<ExitCode> {
    let code = read_code_payload(&config.artifact_path).with_context(|| {
        format!(
            "no deployable artifact at '{}'; run `cargo run -p xtask -- package` first",
            config.artifact_path.display()
        )
    })?;

    let aws = AwsPorts::connect(&config.region).context("failed to start AWS runtime")?;
    let orchestrator = Orchestrator::new(config, aws.ports(), &ThreadSleeper, &TracingObserver);
    let pipeline = orchestrator.provision(&code)?;

    println!("table     {} ({})", pipeline.table.name, pipeline.table.arn);
    println!("role      {} ({})", pipeline.role.name, pipeline.role.arn);
    println!("bucket    {}", pipeline.bucket.name);
    println!("function  {} ({})", pipeline.function.name, pipeline.function.arn);
    println!("trigger   {}", pipeline.trigger.statement_id);
    println!(
        "\nUpload a file to s3://{} to index it into {}.",
        pipeline.bucket.name, pipeline.table.name
    );
    Ok(ExitCode::SUCCESS)
}

fn cleanup(config: &PipelineConfig) -> anyhow::Result<ExitCode> {
    let aws = AwsPorts::connect(&config.region).context("failed to start AWS runtime")?;
    let orchestrator = Orchestrator::new(config, aws.ports(), &ThreadSleeper, &TracingObserver);
    let summary = orchestrator.teardown()?;

    for name in &summary.succeeded {
        println!("removed   {name}");
    }
    if summary.is_clean() {
        return Ok(ExitCode::SUCCESS);
    }

    for (name, error) in &summary.failed {
        eprintln!("FAILED    {name}: {error}");
    }
    eprintln!(
        "\n{} resource(s) could not be deleted; re-run cleanup to retry them.",
        summary.failed.len()
    );
    Ok(ExitCode::FAILURE)
}

fn status(config: &PipelineConfig) -> anyhow::Result<ExitCode> {
    let aws = AwsPorts::connect(&config.region).context("failed to start AWS runtime")?;
    let orchestrator = Orchestrator::new(config, aws.ports(), &ThreadSleeper, &TracingObserver);

    let mut healthy = true;
    for resource in orchestrator.status()? {
        let state = match &resource.state {
            Ok(state) => state.to_string(),
            Err(error) => {
                healthy = false;
                format!("unknown ({error})")
            }
        };
        println!(
            "{:<9} {:<52} {state}",
            resource.spec.kind.as_str(),
            resource.spec.name
        );
    }
    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    telemetry::init_pretty("info");
    let cli = Cli::parse();

    let result = PipelineConfig::from_env()
        .context("invalid pipeline configuration")
        .and_then(|config| match cli.command {
            Command::Provision => provision(&config),
            Command::Cleanup => cleanup(&config),
            Command::Status => status(&config),
        });

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
