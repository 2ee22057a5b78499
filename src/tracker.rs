//! Per-invocation completion tracking.
//!
//! The tracker owns one slot per launched operation and records each outcome
//! exactly once, together with the order in which completions physically
//! arrived. It holds no policy logic.

use crate::error::{WorkerError, WorkerResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Terminal result of one worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(WorkerError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The successful value, if any.
    pub fn value(&self) -> Option<&str> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// The failure cause, if any.
    pub fn error(&self) -> Option<&WorkerError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(err) => Some(err),
        }
    }
}

impl From<WorkerResult> for Outcome {
    fn from(result: WorkerResult) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(err),
        }
    }
}

/// What happened when an outcome was handed to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Stored. `rank` is the 0-based completion position, `remaining` the
    /// number of slots still empty afterwards.
    Recorded { rank: usize, remaining: usize },
    /// The slot was already filled; the outcome was discarded.
    Duplicate,
    /// The index does not belong to this invocation.
    OutOfRange,
}

#[derive(Debug)]
struct TrackerState {
    slots: Vec<Option<Outcome>>,
    order: Vec<usize>,
}

/// Records outcomes by request index.
#[derive(Debug)]
pub struct CompletionTracker {
    state: Mutex<TrackerState>,
    total: usize,
}

impl CompletionTracker {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                slots: vec![None; total],
                order: Vec::with_capacity(total),
            }),
            total,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Slots are only ever written whole, so a poisoned lock still holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the outcome for `index` unless one is already present.
    pub fn record(&self, index: usize, outcome: Outcome) -> RecordStatus {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(index) else {
            return RecordStatus::OutOfRange;
        };
        if slot.is_some() {
            return RecordStatus::Duplicate;
        }
        *slot = Some(outcome);
        state.order.push(index);

        RecordStatus::Recorded {
            rank: state.order.len() - 1,
            remaining: self.total - state.order.len(),
        }
    }

    /// Number of operations this tracker expects.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of outcomes recorded so far.
    pub fn completed(&self) -> usize {
        self.lock().order.len()
    }

    /// Number of successful outcomes recorded so far.
    pub fn succeeded(&self) -> usize {
        self.lock()
            .slots
            .iter()
            .filter(|slot| slot.as_ref().is_some_and(Outcome::is_success))
            .count()
    }

    /// Indices in the order their outcomes arrived.
    pub fn completion_order(&self) -> Vec<usize> {
        self.lock().order.clone()
    }

    /// All outcomes in index order, or `None` while any slot is still empty.
    pub fn outcomes(&self) -> Option<Vec<Outcome>> {
        self.lock().slots.iter().cloned().collect()
    }

    /// Successful values in completion order.
    pub fn values_in_completion_order(&self) -> Vec<String> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|&index| state.slots[index].as_ref())
            .filter_map(|outcome| outcome.value().map(str::to_string))
            .collect()
    }
}

/// Read-only view of an invocation's tracker, usable while work is in flight
/// and after the handle resolved.
#[derive(Debug, Clone)]
pub struct CompletionTrace {
    tracker: Arc<CompletionTracker>,
}

impl CompletionTrace {
    pub(crate) fn new(tracker: Arc<CompletionTracker>) -> Self {
        Self { tracker }
    }

    /// Request indices in physical completion order.
    pub fn order(&self) -> Vec<usize> {
        self.tracker.completion_order()
    }

    pub fn completed(&self) -> usize {
        self.tracker.completed()
    }

    pub fn total(&self) -> usize {
        self.tracker.total()
    }

    /// Number of operations that have succeeded so far.
    pub fn succeeded(&self) -> usize {
        self.tracker.succeeded()
    }

    /// True once every launched operation has reported.
    pub fn is_settled(&self) -> bool {
        self.completed() == self.total()
    }

    /// Successful values in the order they completed.
    pub fn completed_values(&self) -> Vec<String> {
        self.tracker.values_in_completion_order()
    }
}
