//! Data models for run reports.
//!
//! This module contains the structures the CLI fills in after an aggregate
//! resolves, and that the report generators render.

use chrono::{DateTime, Utc};
use fanout::{split_tokens, AggregateResult, CompletionTrace, PolicyKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the aggregate resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The aggregate produced a string.
    Succeeded,
    /// The aggregate failed (worker failure, mismatch, or timeout).
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl RunStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "✅",
            RunStatus::Failed => "❌",
        }
    }
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Policy label, including the fallback for Fail-Soft.
    pub policy: String,
    /// Number of workers launched.
    pub workers: usize,
    /// When the request was fanned out.
    pub started_at: DateTime<Utc>,
    /// Time until the aggregate resolved, in seconds.
    pub duration_seconds: f64,
    /// Caller-side wait limit in seconds.
    pub timeout_seconds: u64,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub status: RunStatus,
    /// Aggregated output when the run succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Number of tokens in the output.
    pub tokens: usize,
    /// Failure message when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request indices in the order the workers finished, as far as observed.
    pub completion_order: Vec<usize>,
    /// Whether every launched worker had reported when the report was built.
    pub settled: bool,
}

impl RunReport {
    /// Build a report from an aggregate result and the run's completion trace.
    pub fn new(
        metadata: RunMetadata,
        kind: PolicyKind,
        result: &AggregateResult,
        trace: Option<&CompletionTrace>,
    ) -> Self {
        let tokens = match (result, trace) {
            (Err(_), _) => 0,
            // A successful aggregate has heard from every worker.
            (Ok(_), Some(trace)) => match kind {
                PolicyKind::FailPartial => trace.succeeded(),
                PolicyKind::FailFast | PolicyKind::FailSoft => trace.total(),
            },
            (Ok(output), None) => split_tokens(output).len(),
        };

        let (status, output, error) = match result {
            Ok(output) => (RunStatus::Succeeded, Some(output.clone()), None),
            Err(err) => (RunStatus::Failed, None, Some(err.to_string())),
        };

        Self {
            metadata,
            status,
            tokens,
            output,
            error,
            completion_order: trace.map(CompletionTrace::order).unwrap_or_default(),
            settled: trace.map(CompletionTrace::is_settled).unwrap_or(true),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
