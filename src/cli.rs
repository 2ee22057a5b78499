//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use fanout::PolicyKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fanout - fan a request out to concurrent workers and aggregate the results
///
/// Runs a pool of synthetic workers (each echoes its input upper-cased after
/// a delay, or fails) and aggregates their outcomes under a failure policy.
///
/// Examples:
///   fanout --policy fail-fast
///   fanout --policy fail-partial --count 14 --fail 1,3,9
///   fanout --policy fail-soft --fallback N/A --inputs a,b,c --fail 1
///   fanout --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Failure policy to aggregate with
    #[arg(short, long, value_name = "POLICY", env = "FANOUT_POLICY")]
    pub policy: Option<PolicyKind>,

    /// Value substituted for failed workers (fail-soft only)
    #[arg(long, value_name = "TEXT")]
    pub fallback: Option<String>,

    /// Worker inputs, one per worker (comma-separated)
    ///
    /// Example: --inputs msg-a,msg-b,msg-c
    #[arg(short, long, value_name = "INPUTS", value_delimiter = ',', conflicts_with = "count")]
    pub inputs: Option<Vec<String>>,

    /// Number of workers, with generated inputs msg-0, msg-1, ...
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub count: Option<usize>,

    /// Indices of workers that should fail (comma-separated)
    #[arg(short, long, value_name = "INDICES", value_delimiter = ',')]
    pub fail: Option<Vec<usize>>,

    /// Delay every worker sleeps before answering
    #[arg(long, value_name = "MS")]
    pub base_delay_ms: Option<u64>,

    /// Extra delay per position from the end; later workers finish first
    #[arg(long, value_name = "MS")]
    pub stagger_ms: Option<u64>,

    /// How long to wait for the aggregate, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Abort outstanding workers once a fail-fast aggregate has failed
    #[arg(long)]
    pub cancel_outstanding: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fanout.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Leave the completion order out of the report
    #[arg(long)]
    pub hide_order: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .fanout.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.fallback.is_some() && self.policy.is_some_and(|p| p != PolicyKind::FailSoft) {
            return Err("--fallback only applies to --policy fail-soft".to_string());
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
