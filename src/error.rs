//! Error types for the aggregation engine.

use std::time::Duration;
use thiserror::Error;

/// Failure raised by a single worker invocation.
///
/// Carries the worker's own message untouched so that Fail-Fast can surface
/// it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WorkerError {
    message: String,
}

impl WorkerError {
    /// Create a worker error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message the worker failed with.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can resolve an [`AggregateHandle`](crate::AggregateHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// Workers and inputs differ in length. Raised before anything is launched.
    #[error("length of workers and inputs must match (workers: {workers}, inputs: {inputs})")]
    ArgumentMismatch { workers: usize, inputs: usize },

    /// A worker failed and the policy let the failure through.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// `run` was called outside a tokio runtime and no runtime handle was configured.
    #[error("no tokio runtime available to launch workers")]
    NoRuntime,

    /// The caller's wait on the handle expired.
    #[error("aggregate did not complete within {0:?}")]
    Timeout(Duration),

    /// Every worker task went away without producing a result.
    #[error("aggregate was abandoned before completion")]
    Abandoned,
}

impl AggregateError {
    /// Returns the worker cause when this is a worker failure.
    pub fn worker_cause(&self) -> Option<&WorkerError> {
        match self {
            AggregateError::Worker(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Convenience alias for aggregate results.
pub type AggregateResult = std::result::Result<String, AggregateError>;

/// Convenience alias for a single worker's result.
pub type WorkerResult = std::result::Result<String, WorkerError>;
