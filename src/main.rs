//! Fanout - concurrent fan-out with policy-driven aggregation
//!
//! A CLI that launches a pool of synthetic workers, aggregates their
//! outcomes under the selected failure policy, and prints a run report.
//!
//! Exit codes:
//!   0 - The aggregate succeeded
//!   1 - Runtime error (invalid arguments, config, report writing, etc.)
//!   2 - The aggregate failed

mod cli;
mod config;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use fanout::worker::staggered_pool;
use fanout::Aggregator;
use models::{RunMetadata, RunReport};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load config before logging so the file can raise the log level
    let mut loaded = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    loaded.config.merge_with_args(&args);

    // Initialize logging
    init_logging(loaded.config.log_level(&args));

    info!("Fanout v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    loaded.source.log();

    match run(args, loaded.config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .fanout.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to choose the policy, inputs, failing workers, and delays.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Fan the configured request out and report the aggregate. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let unused = config.workers.unused_failures();
    if !unused.is_empty() {
        warn!("Failing indices {:?} address no worker and are ignored", unused);
    }

    let inputs = &config.workers.inputs;
    let workers = staggered_pool(
        inputs.len(),
        &config.workers.failing,
        config.workers.base_delay(),
        config.workers.stagger(),
    );
    let policy = config.run.policy();

    if !args.quiet {
        println!("🚀 Fanning out to {} workers", workers.len());
        println!("   Policy: {}", policy);
        println!("   Timeout: {}s", config.run.timeout_seconds);
        if config.run.cancel_outstanding {
            println!("   Cancelling outstanding workers on failure");
        }
    }

    let aggregator = Aggregator::with_config(config.run.aggregator_config());
    let started_at = Utc::now();
    let start_time = Instant::now();

    let handle = aggregator.run(&workers, inputs, policy.clone());
    let trace = handle.trace().cloned();
    let result = handle.wait_timeout(config.run.timeout()).await;
    let duration = start_time.elapsed().as_secs_f64();

    match &result {
        Ok(output) => info!("Aggregate succeeded: {:?}", output),
        Err(e) => warn!("Aggregate failed: {}", e),
    }

    let metadata = RunMetadata {
        policy: policy.to_string(),
        workers: workers.len(),
        started_at,
        duration_seconds: duration,
        timeout_seconds: config.run.timeout_seconds,
    };
    let run_report = RunReport::new(metadata, policy.kind(), &result, trace.as_ref());

    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(&run_report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&run_report, config.report.show_completion_order)
        }
    };

    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                println!("\n✅ Report saved to: {}", path.display());
            }
        }
        None => println!("\n{}", output),
    }

    Ok(if run_report.succeeded() { 0 } else { 2 })
}

/// Where the run's configuration came from.
#[derive(Debug)]
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigSource {
    /// Report the source once logging is up.
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

struct LoadedConfig {
    config: Config,
    source: ConfigSource,
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<LoadedConfig> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok(LoadedConfig {
            config: Config::load(config_path)?,
            source: ConfigSource::Explicit(config_path.clone()),
        });
    }

    // Try default location
    let (config, source) = match Config::load_default() {
        Ok(Some(config)) => (config, ConfigSource::DefaultFile),
        Ok(None) => (Config::default(), ConfigSource::Builtin),
        Err(e) => (Config::default(), ConfigSource::Unreadable(e)),
    };
    Ok(LoadedConfig { config, source })
}
