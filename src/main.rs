//! compliance-mapper - one-shot batch classification job
//!
//! Reads a CSV of cloud security scan items, asks a remote chat-completion
//! service which sections of the configured compliance framework each item
//! maps to, and writes the input rows plus one classification column.
//!
//! Rows that fail individually (scope mismatch, exhausted retries, unusable
//! response) are written with a sentinel value and do not affect the exit
//! code; only startup failures (config, credential, input schema) exit
//! non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use compliance_mapper::client::ClassificationClient;
use compliance_mapper::config::{self, JobConfig};
use compliance_mapper::pipeline;
use compliance_mapper::table::{RecordSource, ResultSink};

/// Command-line arguments for compliance-mapper
#[derive(Parser, Debug)]
#[command(name = "compliance-mapper")]
#[command(about = "Classify compliance scan items against a standards framework")]
#[command(version)]
struct Args {
    /// Input CSV of scan items
    #[arg(short, long, env = "CM_INPUT")]
    input: PathBuf,

    /// Output CSV (input columns plus the classification column)
    #[arg(short, long, env = "CM_OUTPUT")]
    output: PathBuf,

    /// Job configuration file (TOML)
    #[arg(short, long, env = "CM_CONFIG")]
    config: PathBuf,

    /// File holding the API bearer token
    #[arg(short, long, env = "CM_TOKEN_FILE")]
    token_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting compliance-mapper v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = JobConfig::load(&args.config)
        .with_context(|| format!("loading job config {}", args.config.display()))?;
    let token = config::load_token(&args.token_file)?;

    let mut source = RecordSource::open(&args.input)
        .with_context(|| format!("opening input table {}", args.input.display()))?;
    let header = source.header();
    let mut sink = ResultSink::create(&args.output, &header, &config.output_column())
        .with_context(|| format!("creating output table {}", args.output.display()))?;

    info!(
        framework = %config.framework,
        scope = %config.scope,
        batch_size = config.batch_size,
        concurrency = config.concurrency(),
        max_attempts = config.retry.max_attempts,
        "Job configured"
    );

    let classifier = Arc::new(ClassificationClient::new(&config, token)?);
    let summary = pipeline::run(&config, classifier, &mut source, &mut sink).await?;

    info!(
        rows = summary.rows,
        classified = summary.classified,
        skipped = summary.skipped,
        failed = summary.failed,
        "Run complete"
    );

    Ok(())
}
