//! Fanout - concurrent fan-out with policy-driven aggregation.
//!
//! A request is an ordered list of (worker, input) pairs. The [`Aggregator`]
//! invokes every pair concurrently on the tokio runtime and combines the
//! outcomes into a single string according to a [`Policy`]:
//!
//! - [`Policy::FailFast`]: the first failure fails the aggregate.
//! - [`Policy::FailPartial`]: failures are dropped, successes are kept.
//! - [`Policy::FailSoft`]: failures are replaced by a fallback value.
//!
//! Tokens always appear in request order, joined by `", "`, whatever order
//! the workers actually finished in.

pub mod aggregator;
pub mod error;
pub mod policy;
pub mod tracker;
pub mod worker;

pub use aggregator::{AggregateHandle, Aggregator, AggregatorConfig};
pub use error::{AggregateError, AggregateResult, WorkerError, WorkerResult};
pub use policy::{split_tokens, Policy, PolicyKind, SEPARATOR};
pub use tracker::{CompletionTrace, CompletionTracker, Outcome};
pub use worker::{EchoWorker, FailingWorker, FnWorker, SyntheticWorker, Worker};
