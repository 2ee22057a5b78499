//! Synthetic workers with controlled delay and deterministic failure.

use super::Worker;
use crate::error::{WorkerError, WorkerResult};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleeps for a fixed delay, then echoes the upper-cased input or fails.
#[derive(Debug, Clone)]
pub struct SyntheticWorker {
    id: String,
    delay: Duration,
    fail: bool,
    /// Shared across a pool so failure numbers are unique within it.
    failures: Arc<AtomicUsize>,
}

impl SyntheticWorker {
    pub fn new(id: impl Into<String>, delay: Duration, fail: bool) -> Self {
        Self::with_counter(id, delay, fail, Arc::new(AtomicUsize::new(0)))
    }

    fn with_counter(
        id: impl Into<String>,
        delay: Duration,
        fail: bool,
        failures: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            id: id.into(),
            delay,
            fail,
            failures,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

}

impl Worker for SyntheticWorker {
    fn invoke(&self, input: String) -> BoxFuture<'_, WorkerResult> {
        async move {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                let number = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                return Err(WorkerError::new(format!(
                    "synthetic failure #{} from {}",
                    number, self.id
                )));
            }
            Ok(input.to_uppercase())
        }
        .boxed()
    }

    fn name(&self) -> &str {
        &self.id
    }
}

/// Build `count` synthetic workers named `svc-<i>`.
///
/// Worker `i` sleeps `base + (count - i) * stagger`, so higher indices finish
/// first. Delays that do not fit in a `Duration` saturate at `Duration::MAX`.
/// Indices listed in `failing` fail after their delay.
pub fn staggered_pool(
    count: usize,
    failing: &[usize],
    base: Duration,
    stagger: Duration,
) -> Vec<Arc<dyn Worker>> {
    let failures = Arc::new(AtomicUsize::new(0));
    (0..count)
        .map(|index| {
            let delay = staggered_delay(base, stagger, count - index);
            let worker = SyntheticWorker::with_counter(
                format!("svc-{}", index),
                delay,
                failing.contains(&index),
                Arc::clone(&failures),
            );
            Arc::new(worker) as Arc<dyn Worker>
        })
        .collect()
}

fn staggered_delay(base: Duration, stagger: Duration, steps: usize) -> Duration {
    u32::try_from(steps)
        .ok()
        .and_then(|steps| stagger.checked_mul(steps))
        .and_then(|extra| base.checked_add(extra))
        .unwrap_or(Duration::MAX)
}

/// Inputs `msg-0`, `msg-1`, ... in ascending order.
pub fn numbered_inputs(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("msg-{}", i)).collect()
}
