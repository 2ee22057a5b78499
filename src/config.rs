//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fanout.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use fanout::worker::numbered_inputs;
use fanout::{AggregatorConfig, Policy, PolicyKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".fanout.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Synthetic worker pool settings.
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Failure policy.
    #[serde(default)]
    pub policy: PolicyKind,

    /// Token substituted for failed workers under fail-soft.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// How long to wait for the aggregate, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Abort outstanding workers once a fail-fast aggregate has failed.
    #[serde(default)]
    pub cancel_outstanding: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            fallback: default_fallback(),
            timeout_seconds: default_timeout(),
            cancel_outstanding: false,
        }
    }
}

fn default_fallback() -> String {
    "FALLBACK".to_string()
}

fn default_timeout() -> u64 {
    5
}

/// Synthetic worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// One input per worker, in request order.
    #[serde(default = "default_inputs")]
    pub inputs: Vec<String>,

    /// Indices of workers that fail.
    #[serde(default)]
    pub failing: Vec<usize>,

    /// Delay every worker sleeps before answering, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Extra delay per position from the end, in milliseconds.
    /// Worker `i` of `n` sleeps `base + (n - i) * stagger`.
    #[serde(default = "default_stagger")]
    pub stagger_ms: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            inputs: default_inputs(),
            failing: Vec::new(),
            base_delay_ms: default_base_delay(),
            stagger_ms: default_stagger(),
        }
    }
}

fn default_inputs() -> Vec<String> {
    vec!["msg-a", "msg-b", "msg-c"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_base_delay() -> u64 {
    40
}

fn default_stagger() -> u64 {
    10
}

/// Report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Include the completion order table.
    #[serde(default = "default_true")]
    pub show_completion_order: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            show_completion_order: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    /// The policy with its fallback attached.
    pub fn policy(&self) -> Policy {
        Policy::from_kind(self.policy, self.fallback.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            cancel_outstanding: self.cancel_outstanding,
        }
    }
}

impl WorkersConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    /// Failing indices that do not address any worker.
    pub fn unused_failures(&self) -> Vec<usize> {
        self.failing
            .iter()
            .copied()
            .filter(|&index| index >= self.inputs.len())
            .collect()
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.fanout.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(policy) = args.policy {
            self.run.policy = policy;
        }
        if let Some(ref fallback) = args.fallback {
            self.run.fallback = fallback.clone();
        }
        if let Some(timeout) = args.timeout {
            self.run.timeout_seconds = timeout;
        }
        if args.cancel_outstanding {
            self.run.cancel_outstanding = true;
        }

        // --count generates inputs, --inputs lists them
        if let Some(count) = args.count {
            self.workers.inputs = numbered_inputs(count);
        }
        if let Some(ref inputs) = args.inputs {
            self.workers.inputs = inputs.clone();
        }
        if let Some(ref failing) = args.fail {
            self.workers.failing = failing.clone();
        }
        if let Some(base) = args.base_delay_ms {
            self.workers.base_delay_ms = base;
        }
        if let Some(stagger) = args.stagger_ms {
            self.workers.stagger_ms = stagger;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if args.hide_order {
            self.report.show_completion_order = false;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for this run. `--quiet` wins over a verbose config file.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if self.general.verbose && !args.quiet {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
