//! Worker contract and the basic worker implementations.
//!
//! A worker is an opaque unit of asynchronous work: it accepts an input string
//! and eventually produces a string or fails. The aggregator only ever sees the
//! [`Worker`] trait, so succeeding, failing, and closure-backed workers are
//! interchangeable.

pub mod synthetic;

pub use synthetic::{numbered_inputs, staggered_pool, SyntheticWorker};

use crate::error::{WorkerError, WorkerResult};
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// An asynchronous unit of work invoked once per request element.
///
/// Implementations must tolerate concurrent invocations for distinct inputs.
pub trait Worker: Send + Sync {
    /// Start one invocation for `input`.
    fn invoke(&self, input: String) -> BoxFuture<'_, WorkerResult>;

    /// Name used in log lines.
    fn name(&self) -> &str {
        "worker"
    }
}

/// Succeeds with the upper-cased input.
#[derive(Debug, Clone, Default)]
pub struct EchoWorker;

impl Worker for EchoWorker {
    fn invoke(&self, input: String) -> BoxFuture<'_, WorkerResult> {
        future::ready(Ok(input.to_uppercase())).boxed()
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Always fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingWorker {
    message: String,
}

impl FailingWorker {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Worker for FailingWorker {
    fn invoke(&self, _input: String) -> BoxFuture<'_, WorkerResult> {
        future::ready(Err(WorkerError::new(self.message.clone()))).boxed()
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Worker backed by a closure returning a future.
pub struct FnWorker<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnWorker<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = WorkerResult> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = WorkerResult> + Send + 'static,
{
    fn invoke(&self, input: String) -> BoxFuture<'_, WorkerResult> {
        (self.func)(input).boxed()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Shorthand for a shared succeeding worker.
pub fn echo() -> Arc<dyn Worker> {
    Arc::new(EchoWorker)
}

/// Shorthand for a shared failing worker.
pub fn failing(message: impl Into<String>) -> Arc<dyn Worker> {
    Arc::new(FailingWorker::new(message))
}
