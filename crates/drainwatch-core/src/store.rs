//! Job state store: one `watch` channel per job.
//!
//! The sampler holds the only [`JobWriter`]; the controller holds the
//! [`JobStore`] (which can only abort); UI code gets [`JobReader`]s that see
//! every published state but cannot mutate it. All mutations go through the
//! channel's own lock, so a writer that observes a terminal status under
//! that lock can never resurrect the job.

use std::sync::Arc;

use tokio::sync::watch;

use crate::clock::UnixMillis;
use crate::estimator::{self, DeltaEstimator, TickOutcome};
use crate::job::{FinalSummary, JobState, JobStatus};
use crate::record_db::PersistedJobRecord;

/// Controller-side handle to a job's state.
#[derive(Clone)]
pub struct JobStore {
    tx: Arc<watch::Sender<JobState>>,
}

impl JobStore {
    pub fn new(state: JobState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> JobReader {
        JobReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Clone of the current state.
    pub fn current(&self) -> JobState {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.tx.borrow().status
    }

    /// Move the job to `Aborted` unless it is already terminal.
    pub fn abort(&self, now: UnixMillis, reason: &str) -> bool {
        self.tx
            .send_if_modified(|state| estimator::abort(state, now, reason))
    }

    pub(crate) fn writer(&self) -> JobWriter {
        JobWriter {
            tx: Arc::clone(&self.tx),
        }
    }
}

/// The estimator's write handle, owned by the sampler task.
pub(crate) struct JobWriter {
    tx: Arc<watch::Sender<JobState>>,
}

impl JobWriter {
    pub(crate) fn apply_snapshot(
        &self,
        estimator: &DeltaEstimator,
        snapshot: crate::job::Snapshot,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::Ignored;
        self.tx.send_if_modified(|state| {
            outcome = estimator.apply(state, snapshot);
            outcome != TickOutcome::Ignored
        });
        outcome
    }

    pub(crate) fn note_fetch_failure(&self, now: UnixMillis, error: &str) {
        self.tx
            .send_if_modified(|state| estimator::note_fetch_failure(state, now, error));
    }

    pub(crate) fn time_out(&self, estimator: &DeltaEstimator, now: UnixMillis) -> bool {
        self.tx
            .send_if_modified(|state| estimator.time_out(state, now))
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.tx.borrow().is_terminal()
    }

    /// Durable subset of the current state.
    pub(crate) fn record(&self) -> PersistedJobRecord {
        PersistedJobRecord::from_state(&self.tx.borrow())
    }
}

/// Read-only view for UI consumers.
#[derive(Clone)]
pub struct JobReader {
    rx: watch::Receiver<JobState>,
}

impl JobReader {
    /// Latest published state (poll-style access).
    pub fn current(&self) -> JobState {
        self.rx.borrow().clone()
    }

    /// Wait for the next published change. Returns false once the job's
    /// store has been dropped and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the job is terminal and return its one-time summary.
    /// Returns None if the store was dropped before the job finished.
    pub async fn wait_terminal(&mut self) -> Option<FinalSummary> {
        loop {
            {
                let state = self.rx.borrow_and_update();
                if state.is_terminal() {
                    return state.summary.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                let state = self.rx.borrow();
                return state.summary.clone();
            }
        }
    }
}
