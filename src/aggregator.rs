//! Fan-out and aggregation.
//!
//! [`Aggregator::run`] launches one tokio task per (worker, input) pair and
//! returns an [`AggregateHandle`] straight away. Each task reports its outcome
//! to a shared coordinator, which records it in the [`CompletionTracker`],
//! asks the [`Policy`] whether to stop early, and once every outcome is in
//! synthesizes the final string. The handle resolves through a
//! single-assignment terminal cell, so only the first resolution ever lands.

use crate::error::{AggregateError, AggregateResult, WorkerError};
use crate::policy::{Policy, Verdict};
use crate::tracker::{CompletionTrace, CompletionTracker, Outcome, RecordStatus};
use crate::worker::Worker;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Tunables for an [`Aggregator`].
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfig {
    /// Abort outstanding worker tasks once a Fail-Fast aggregate has failed.
    pub cancel_outstanding: bool,
}

/// Launches workers and wires their completions to a policy.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
    runtime: Option<Handle>,
}

impl Aggregator {
    /// Aggregator that spawns onto the ambient tokio runtime.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AggregatorConfig) -> Self {
        Self {
            config,
            runtime: None,
        }
    }

    /// Spawn worker tasks onto `runtime` instead of the ambient one.
    pub fn on_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Invoke `workers[i]` with `inputs[i]` for every index, concurrently, and
    /// aggregate the outcomes under `policy`.
    ///
    /// Returns immediately. A length mismatch yields an already-failed handle
    /// and invokes nothing.
    pub fn run<S: AsRef<str>>(
        &self,
        workers: &[Arc<dyn Worker>],
        inputs: &[S],
        policy: Policy,
    ) -> AggregateHandle {
        if workers.len() != inputs.len() {
            warn!(
                "[{}] rejected request: {} workers but {} inputs",
                policy.label(),
                workers.len(),
                inputs.len()
            );
            return AggregateHandle::resolved(Err(AggregateError::ArgumentMismatch {
                workers: workers.len(),
                inputs: inputs.len(),
            }));
        }

        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("[{}] no tokio runtime to launch workers on", policy.label());
            return AggregateHandle::resolved(Err(AggregateError::NoRuntime));
        };

        let total = workers.len();
        info!("[{}] processing {} workers", policy.label(), total);

        let (sender, receiver) = oneshot::channel();
        let tracker = Arc::new(CompletionTracker::new(total));
        let coordinator = Arc::new(Coordinator {
            policy,
            tracker: Arc::clone(&tracker),
            terminal: TerminalCell::new(sender),
            cancel_outstanding: self.config.cancel_outstanding,
            tasks: Mutex::new(Vec::new()),
        });

        if total == 0 {
            coordinator.settle();
        }

        let tasks: Vec<AbortHandle> = workers
            .iter()
            .zip(inputs)
            .enumerate()
            .map(|(index, (worker, input))| {
                let worker = Arc::clone(worker);
                let input = input.as_ref().to_string();
                let coordinator = Arc::clone(&coordinator);

                runtime
                    .spawn(async move {
                        let name = worker.name().to_string();
                        let result = AssertUnwindSafe(async move { worker.invoke(input).await })
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|_| {
                                Err(WorkerError::new(format!("worker {} panicked", name)))
                            });
                        coordinator.complete(index, Outcome::from(result));
                    })
                    .abort_handle()
            })
            .collect();
        coordinator.register(tasks);

        AggregateHandle::launched(receiver, CompletionTrace::new(tracker))
    }

    /// Fail as soon as any worker fails; otherwise join every value.
    pub fn run_fail_fast<S: AsRef<str>>(
        &self,
        workers: &[Arc<dyn Worker>],
        inputs: &[S],
    ) -> AggregateHandle {
        self.run(workers, inputs, Policy::FailFast)
    }

    /// Wait for every worker and join only the successful values.
    pub fn run_fail_partial<S: AsRef<str>>(
        &self,
        workers: &[Arc<dyn Worker>],
        inputs: &[S],
    ) -> AggregateHandle {
        self.run(workers, inputs, Policy::FailPartial)
    }

    /// Wait for every worker and replace each failure with `fallback`.
    pub fn run_fail_soft<S: AsRef<str>>(
        &self,
        workers: &[Arc<dyn Worker>],
        inputs: &[S],
        fallback: impl Into<String>,
    ) -> AggregateHandle {
        self.run(
            workers,
            inputs,
            Policy::FailSoft {
                fallback: fallback.into(),
            },
        )
    }
}

const PENDING: u8 = 0;
const SUCCEEDED: u8 = 1;
const FAILED: u8 = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending -> Succeeded | Failed, exactly once.
struct TerminalCell {
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<AggregateResult>>>,
}

impl TerminalCell {
    fn new(sender: oneshot::Sender<AggregateResult>) -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Resolve the cell. Returns false, and drops `result`, if it was already resolved.
    fn try_complete(&self, result: AggregateResult) -> bool {
        let next = if result.is_ok() { SUCCEEDED } else { FAILED };
        if self
            .state
            .compare_exchange(PENDING, next, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Some(sender) = lock(&self.sender).take() {
            // The caller may have dropped the handle already.
            let _ = sender.send(result);
        }
        true
    }

    fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    fn has_failed(&self) -> bool {
        self.state.load(Ordering::Acquire) == FAILED
    }
}

/// Per-invocation shared state. Dropped once every worker task has finished.
struct Coordinator {
    policy: Policy,
    tracker: Arc<CompletionTracker>,
    terminal: TerminalCell,
    cancel_outstanding: bool,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl Coordinator {
    fn complete(&self, index: usize, outcome: Outcome) {
        let label = self.policy.label();
        let verdict = self.policy.observe(index, &outcome);

        let remaining = match self.tracker.record(index, outcome) {
            RecordStatus::Recorded { rank, remaining } => {
                debug!(
                    "[{}] worker {} completed (rank {}, {} remaining)",
                    label, index, rank, remaining
                );
                remaining
            }
            status => {
                warn!("[{}] ignoring outcome for worker {}: {:?}", label, index, status);
                return;
            }
        };

        if let Verdict::Fail(err) = verdict {
            if self.terminal.try_complete(Err(AggregateError::Worker(err))) {
                info!("[{}] aggregate failed on worker {}", label, index);
                if self.cancel_outstanding {
                    self.abort_outstanding();
                }
            } else {
                debug!("[{}] discarding failure of worker {}, already resolved", label, index);
            }
        }

        if remaining == 0 {
            self.settle();
        }
    }

    /// Synthesize the final result once every outcome is recorded.
    fn settle(&self) {
        let Some(outcomes) = self.tracker.outcomes() else {
            return;
        };

        if !self.terminal.is_pending() {
            debug!(
                "[{}] all {} workers reported after resolution, results discarded",
                self.policy.label(),
                outcomes.len()
            );
            return;
        }

        let result = self.policy.synthesize(&outcomes);
        if self.terminal.try_complete(result) {
            info!(
                "[{}] all {} workers completed",
                self.policy.label(),
                outcomes.len()
            );
        }
    }

    fn register(&self, tasks: Vec<AbortHandle>) {
        lock(&self.tasks).extend(tasks);
        // A failure may have landed before the handles were registered.
        if self.cancel_outstanding && self.terminal.has_failed() {
            self.abort_outstanding();
        }
    }

    fn abort_outstanding(&self) {
        let tasks = lock(&self.tasks);
        debug!(
            "[{}] cancelling up to {} outstanding workers",
            self.policy.label(),
            tasks.len()
        );
        for task in tasks.iter() {
            task.abort();
        }
    }
}

#[derive(Debug)]
enum HandleState {
    Resolved(Option<AggregateResult>),
    Waiting(oneshot::Receiver<AggregateResult>),
}

/// Asynchronous placeholder for an aggregate result.
///
/// Await it (or compose it with `futures` combinators) to get the result.
/// Dropping it does not stop workers that are already running.
#[derive(Debug)]
#[must_use = "dropping the handle discards the aggregate result"]
pub struct AggregateHandle {
    state: HandleState,
    trace: Option<CompletionTrace>,
}

impl AggregateHandle {
    fn resolved(result: AggregateResult) -> Self {
        Self {
            state: HandleState::Resolved(Some(result)),
            trace: None,
        }
    }

    fn launched(receiver: oneshot::Receiver<AggregateResult>, trace: CompletionTrace) -> Self {
        Self {
            state: HandleState::Waiting(receiver),
            trace: Some(trace),
        }
    }

    /// Completion trace of the launched workers. `None` when nothing was launched.
    pub fn trace(&self) -> Option<&CompletionTrace> {
        self.trace.as_ref()
    }

    /// Take the result if it is already available, without waiting.
    pub fn try_result(&mut self) -> Option<AggregateResult> {
        let taken = match &mut self.state {
            HandleState::Resolved(result) => result.take(),
            HandleState::Waiting(receiver) => match receiver.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => Some(Err(AggregateError::Abandoned)),
            },
        };
        self.state = HandleState::Resolved(None);
        taken
    }

    /// Await the result, giving up after `limit`.
    pub async fn wait_timeout(self, limit: Duration) -> AggregateResult {
        match tokio::time::timeout(limit, self).await {
            Ok(result) => result,
            Err(_) => Err(AggregateError::Timeout(limit)),
        }
    }
}

impl Future for AggregateHandle {
    type Output = AggregateResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            HandleState::Resolved(result) => {
                Poll::Ready(result.take().unwrap_or(Err(AggregateError::Abandoned)))
            }
            HandleState::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_| Err(AggregateError::Abandoned))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::split_tokens;
    use crate::worker::{echo, failing, numbered_inputs, staggered_pool, FnWorker, SyntheticWorker};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;
    use tokio_test::{assert_pending, assert_ready};

    fn messages() -> Vec<String> {
        vec!["msg-a", "msg-b", "msg-c"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn soft() -> Policy {
        Policy::FailSoft {
            fallback: "FALLBACK".to_string(),
        }
    }

    fn all_policies() -> Vec<Policy> {
        vec![Policy::FailFast, Policy::FailPartial, soft()]
    }

    fn counting_worker(calls: &Arc<AtomicUsize>) -> Arc<dyn Worker> {
        let calls = Arc::clone(calls);
        Arc::new(FnWorker::new("counting", move |input: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, WorkerError>(input.to_uppercase()) }
        }))
    }

    struct PanickingWorker;

    impl Worker for PanickingWorker {
        fn invoke(&self, _input: String) -> BoxFuture<'_, crate::error::WorkerResult> {
            panic!("worker exploded")
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_success_is_identical_across_policies() {
        let aggregator = Aggregator::new();
        let workers = vec![echo(), echo(), echo()];

        for policy in all_policies() {
            let result = aggregator.run(&workers, &messages(), policy).await;
            assert_eq!(result.unwrap(), "MSG-A, MSG-B, MSG-C");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_failure_per_policy() {
        let aggregator = Aggregator::new();
        let workers = vec![echo(), failing("Microservice B Failure"), echo()];

        let err = aggregator
            .run_fail_fast(&workers, &messages())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AggregateError::Worker(WorkerError::new("Microservice B Failure"))
        );

        let partial = aggregator.run_fail_partial(&workers, &messages()).await;
        assert_eq!(partial.unwrap(), "MSG-A, MSG-C");

        let soft = aggregator
            .run_fail_soft(&workers, &messages(), "FALLBACK")
            .await;
        assert_eq!(soft.unwrap(), "MSG-A, FALLBACK, MSG-C");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_failures_per_policy() {
        let aggregator = Aggregator::new();
        let causes = ["Microservice A Failure", "Microservice B Failure", "Microservice C Failure"];
        let workers: Vec<Arc<dyn Worker>> = causes.iter().map(|cause| failing(*cause)).collect();

        let err = aggregator
            .run_fail_fast(&workers, &messages())
            .await
            .unwrap_err();
        let cause = err.worker_cause().expect("fail-fast surfaces a worker cause");
        assert!(causes.contains(&cause.message()));

        let partial = aggregator.run_fail_partial(&workers, &messages()).await;
        assert_eq!(partial.unwrap(), "");

        let soft = aggregator
            .run_fail_soft(&workers, &messages(), "FALLBACK")
            .await;
        assert_eq!(soft.unwrap(), "FALLBACK, FALLBACK, FALLBACK");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_failures_surface_a_real_cause() {
        let aggregator = Aggregator::new();
        let causes: Vec<String> = (0..16).map(|i| format!("cause-{}", i)).collect();
        let workers: Vec<Arc<dyn Worker>> = causes.iter().map(|c| failing(c.as_str())).collect();

        for _ in 0..10 {
            let err = aggregator
                .run_fail_fast(&workers, &numbered_inputs(16))
                .await
                .unwrap_err();
            let cause = err.worker_cause().expect("worker cause");
            assert!(causes.iter().any(|c| c == cause.message()));
        }
    }

    #[tokio::test]
    async fn test_length_mismatch_fails_without_invoking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let workers = vec![
            counting_worker(&calls),
            counting_worker(&calls),
            counting_worker(&calls),
        ];
        let inputs = vec!["msg-a", "msg-b"];

        for policy in all_policies() {
            let handle = Aggregator::new().run(&workers, &inputs, policy);
            assert!(handle.trace().is_none());

            let mut task = tokio_test::task::spawn(handle);
            let result = assert_ready!(task.poll());
            assert_eq!(
                result,
                Err(AggregateError::ArgumentMismatch {
                    workers: 3,
                    inputs: 2
                })
            );
        }

        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_request_succeeds_with_empty_string() {
        let workers: Vec<Arc<dyn Worker>> = Vec::new();
        let inputs: Vec<String> = Vec::new();

        for policy in all_policies() {
            let result = Aggregator::new().run(&workers, &inputs, policy).await;
            assert_eq!(result.unwrap(), "");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fail_fast_resolves_before_slow_sibling() {
        let workers: Vec<Arc<dyn Worker>> = vec![
            Arc::new(SyntheticWorker::new("slow", Duration::from_secs(2), false)),
            failing("Microservice B Failure"),
        ];
        let started = Instant::now();

        let result = Aggregator::new()
            .run_fail_fast(&workers, &["msg-a", "msg-b"])
            .wait_timeout(Duration::from_secs(1))
            .await;

        assert_eq!(result.unwrap_err().to_string(), "Microservice B Failure");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_barrier_policies_wait_for_every_worker() {
        let workers: Vec<Arc<dyn Worker>> = vec![
            Arc::new(SyntheticWorker::new("slow", Duration::from_millis(150), false)),
            failing("Microservice B Failure"),
        ];

        let mut handle = Aggregator::new().run(&workers, &["msg-a", "msg-b"], soft());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.try_result().is_none());

        let trace = handle.trace().cloned().expect("launched");
        let result = handle.await;
        assert_eq!(result.unwrap(), "MSG-A, FALLBACK");
        assert!(trace.is_settled());
        assert_eq!(trace.order(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_handle_is_pending_until_workers_report() {
        let workers: Vec<Arc<dyn Worker>> = vec![Arc::new(SyntheticWorker::new(
            "svc-0",
            Duration::from_millis(30),
            false,
        ))];

        let mut task = tokio_test::task::spawn(Aggregator::new().run_fail_partial(&workers, &["msg-0"]));
        assert_pending!(task.poll());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(task.is_woken());
        assert_eq!(assert_ready!(task.poll()).unwrap(), "MSG-0");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wait_timeout_expires_on_slow_barrier() {
        let workers: Vec<Arc<dyn Worker>> = vec![Arc::new(SyntheticWorker::new(
            "slow",
            Duration::from_secs(1),
            false,
        ))];

        let limit = Duration::from_millis(50);
        let result = Aggregator::new()
            .run_fail_partial(&workers, &["msg-a"])
            .wait_timeout(limit)
            .await;
        assert_eq!(result, Err(AggregateError::Timeout(limit)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_output_follows_index_order_not_completion_order() {
        let count = 12;
        let workers = staggered_pool(count, &[], Duration::ZERO, Duration::from_millis(15));
        let inputs = numbered_inputs(count);

        let handle = Aggregator::new().run(&workers, &inputs, soft());
        let trace = handle.trace().cloned().expect("launched");
        let result = handle.wait_timeout(Duration::from_secs(4)).await.unwrap();

        let expected: Vec<String> = inputs.iter().map(|i| i.to_uppercase()).collect();
        assert_eq!(result, expected.join(", "));

        let mut order = trace.order();
        assert_eq!(order.len(), count);
        order.sort_unstable();
        assert_eq!(order, (0..count).collect::<Vec<_>>());
        assert_eq!(trace.completed_values().len(), count);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_liveness_fail_fast_with_many_workers() {
        let workers = staggered_pool(13, &[0], Duration::from_millis(40), Duration::from_millis(10));
        let result = Aggregator::new()
            .run_fail_fast(&workers, &numbered_inputs(13))
            .wait_timeout(Duration::from_secs(2))
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("synthetic failure"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_liveness_fail_partial_with_many_workers() {
        let workers = staggered_pool(14, &[1, 3, 9], Duration::from_millis(40), Duration::from_millis(10));
        let result = Aggregator::new()
            .run_fail_partial(&workers, &numbered_inputs(14))
            .wait_timeout(Duration::from_secs(4))
            .await
            .unwrap();

        let tokens = split_tokens(&result);
        assert_eq!(tokens.len(), 11);
        assert!(!tokens.contains(&"FALLBACK"));
        assert!(tokens.iter().all(|t| t.starts_with("MSG-")));
        assert_eq!(tokens[0], "MSG-0");
        assert_eq!(tokens[1], "MSG-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_liveness_fail_soft_with_many_workers() {
        let workers = staggered_pool(12, &[2, 7], Duration::from_millis(40), Duration::from_millis(10));
        let result = Aggregator::new()
            .run_fail_soft(&workers, &numbered_inputs(12), "FALLBACK")
            .wait_timeout(Duration::from_secs(4))
            .await
            .unwrap();

        let tokens = split_tokens(&result);
        assert_eq!(tokens.len(), 12);
        assert_eq!(tokens.iter().filter(|t| **t == "FALLBACK").count(), 2);
        assert_eq!(tokens.iter().filter(|t| t.starts_with("MSG-")).count(), 10);
        assert_eq!(tokens[2], "FALLBACK");
        assert_eq!(tokens[7], "FALLBACK");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_runs_are_identical() {
        let aggregator = Aggregator::new();
        let workers: Vec<Arc<dyn Worker>> = (0..8).map(|_| echo()).collect();
        let inputs = numbered_inputs(8);

        let runs = futures::future::join_all(
            (0..5).map(|_| aggregator.run(&workers, &inputs, Policy::FailFast)),
        )
        .await;

        let first = runs[0].clone().unwrap();
        assert!(runs.iter().all(|run| run.as_ref() == Ok(&first)));
    }

    fn slow_flagging_worker(finished: &Arc<AtomicBool>) -> Arc<dyn Worker> {
        let finished = Arc::clone(finished);
        Arc::new(FnWorker::new("slow", move |input: String| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                finished.store(true, Ordering::SeqCst);
                Ok::<_, WorkerError>(input)
            }
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_outstanding_aborts_siblings() {
        let finished = Arc::new(AtomicBool::new(false));
        let workers = vec![failing("boom"), slow_flagging_worker(&finished)];
        let aggregator = Aggregator::with_config(AggregatorConfig {
            cancel_outstanding: true,
        });

        let err = aggregator
            .run_fail_fast(&workers, &["a", "b"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_siblings_keep_running_without_cancellation() {
        let finished = Arc::new(AtomicBool::new(false));
        let workers = vec![failing("boom"), slow_flagging_worker(&finished)];

        let handle = Aggregator::new().run_fail_fast(&workers, &["a", "b"]);
        let trace = handle.trace().cloned().expect("launched");
        assert!(handle.await.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert!(trace.is_settled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_worker_counts_as_failure() {
        let workers: Vec<Arc<dyn Worker>> = vec![echo(), Arc::new(PanickingWorker)];
        let aggregator = Aggregator::new();

        let soft_result = aggregator.run(&workers, &["msg-a", "msg-b"], soft()).await;
        assert_eq!(soft_result.unwrap(), "MSG-A, FALLBACK");

        let err = aggregator
            .run_fail_fast(&workers, &["msg-a", "msg-b"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "worker panicking panicked");
    }

    #[test]
    fn test_without_runtime_fails_immediately() {
        let workers = vec![echo()];
        let handle = Aggregator::new().run_fail_soft(&workers, &["msg-a"], "FALLBACK");
        assert_eq!(
            futures::executor::block_on(handle),
            Err(AggregateError::NoRuntime)
        );
    }

    #[test]
    fn test_explicit_runtime_handle() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let aggregator = Aggregator::new().on_runtime(runtime.handle().clone());

        let workers = vec![echo(), echo()];
        let handle = aggregator.run_fail_partial(&workers, &["x", "y"]);
        assert_eq!(runtime.block_on(handle).unwrap(), "X, Y");
    }

    #[test]
    fn test_terminal_cell_first_write_wins() {
        let (sender, mut receiver) = oneshot::channel();
        let cell = TerminalCell::new(sender);
        let wins = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let cell = &cell;
                let wins = &wins;
                scope.spawn(move || {
                    let err = AggregateError::Worker(WorkerError::new(format!("cause-{}", i)));
                    if cell.try_complete(Err(err)) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(cell.has_failed());
        assert!(!cell.try_complete(Ok("late".to_string())));

        let received = receiver.try_recv().unwrap();
        assert!(received.unwrap_err().to_string().starts_with("cause-"));
    }
}
