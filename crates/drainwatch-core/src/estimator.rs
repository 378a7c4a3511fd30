//! Delta estimator: turns consecutive snapshots into progress, throughput,
//! a success/failure split, and a terminal decision.
//!
//! Everything here is synchronous and operates on a `&mut JobState`, so the
//! rules can be tested without timers or a store.

use crate::clock::{millis_to_secs, UnixMillis};
use crate::job::{Attribution, FinalSummary, JobState, JobStatus, ReportedCounts, Snapshot, ThroughputPoint};

/// Result of feeding one snapshot to the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First snapshot: baseline established, job is now Running.
    Baseline,
    /// Derived metrics updated; job still Running.
    Updated,
    /// Job reached a terminal status on this tick.
    Terminal(JobStatus),
    /// Job was already terminal; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct DeltaEstimator {
    hard_ceiling_ms: i64,
}

impl DeltaEstimator {
    pub fn new(hard_ceiling_ms: i64) -> Self {
        Self { hard_ceiling_ms }
    }

    /// Apply one snapshot. Terminal states are final: a terminal job is never mutated.
    pub fn apply(&self, state: &mut JobState, snapshot: Snapshot) -> TickOutcome {
        if state.is_terminal() {
            return TickOutcome::Ignored;
        }
        state.samples += 1;

        let Some(baseline) = state.baseline else {
            state.baseline = Some(snapshot);
            state.latest = Some(snapshot);
            state.status = JobStatus::Running;
            state.push_event(
                snapshot.observed_at,
                format!("baseline established: remaining={}", snapshot.remaining),
            );
            return match self.check_termination(state, &snapshot) {
                Some(status) => TickOutcome::Terminal(status),
                None => TickOutcome::Baseline,
            };
        };
        let previous = state.latest.unwrap_or(baseline);

        // Replenishment reads as noise: consumption never goes below zero and
        // never below what an earlier tick already observed.
        let consumed_now = baseline.remaining.saturating_sub(snapshot.remaining);
        state.consumed = state.consumed.max(consumed_now);

        let elapsed_ms = snapshot.observed_at - previous.observed_at;
        if elapsed_ms > 0 {
            let delta = previous.remaining as f64 - snapshot.remaining as f64;
            state.throughput = delta.max(0.0) / millis_to_secs(elapsed_ms);
            state.latest = Some(snapshot);
            state.push_history(ThroughputPoint {
                observed_at: snapshot.observed_at,
                throughput: state.throughput,
                succeeded: snapshot.succeeded,
                failed: snapshot.failed,
            });
        } else {
            tracing::debug!(
                resource_id = %state.request.resource_id,
                elapsed_ms,
                "duplicate or out-of-order sample; throughput unchanged"
            );
        }

        let target = state.request.target_count;
        let pct = (state.consumed as f64 / target as f64 * 100.0).min(100.0);
        state.progress_pct = state.progress_pct.max(pct);
        state.attribution = Attribution::inferred(target, state.consumed, false);

        state.push_event(
            snapshot.observed_at,
            format!(
                "remaining={} consumed={} ({:.1}%) throughput={:.1}/s",
                snapshot.remaining, state.consumed, state.progress_pct, state.throughput
            ),
        );

        match self.check_termination(state, &snapshot) {
            Some(status) => TickOutcome::Terminal(status),
            None => TickOutcome::Updated,
        }
    }

    /// Termination rules, in priority order: target reached, resource
    /// exhausted, hard ceiling exceeded. Progress wins ties with the ceiling.
    fn check_termination(&self, state: &mut JobState, snapshot: &Snapshot) -> Option<JobStatus> {
        let target = state.request.target_count;
        if state.consumed >= target {
            finalize(state, JobStatus::Converged, snapshot.observed_at, false, "target reached");
            return Some(JobStatus::Converged);
        }
        if snapshot.remaining == 0 {
            finalize(
                state,
                JobStatus::Converged,
                snapshot.observed_at,
                true,
                "resource exhausted before target",
            );
            return Some(JobStatus::Converged);
        }
        if snapshot.observed_at - state.request.created_at > self.hard_ceiling_ms {
            finalize(state, JobStatus::TimedOut, snapshot.observed_at, false, "hard ceiling exceeded");
            return Some(JobStatus::TimedOut);
        }
        None
    }

    /// Hard-ceiling expiry reported by the sampler. Returns false if the job
    /// was already terminal.
    pub fn time_out(&self, state: &mut JobState, now: UnixMillis) -> bool {
        if state.is_terminal() {
            return false;
        }
        finalize(state, JobStatus::TimedOut, now, false, "hard ceiling reached without convergence");
        true
    }
}

/// Abort a job (cancel or replacement). Returns false if already terminal.
pub fn abort(state: &mut JobState, now: UnixMillis, reason: &str) -> bool {
    if state.is_terminal() {
        return false;
    }
    finalize(state, JobStatus::Aborted, now, false, reason);
    true
}

/// Record a failed fetch. The job stays in its current status.
pub fn note_fetch_failure(state: &mut JobState, now: UnixMillis, error: &str) -> bool {
    if state.is_terminal() {
        return false;
    }
    state.failed_fetches += 1;
    state.push_event(now, format!("snapshot fetch failed, retrying next tick: {error}"));
    true
}

fn finalize(state: &mut JobState, status: JobStatus, at: UnixMillis, exhausted_short: bool, reason: &str) {
    let target = state.request.target_count;
    let attribution = Attribution::inferred(target, state.consumed, exhausted_short);
    let reported = match (state.baseline, state.latest) {
        (Some(b), Some(l)) => ReportedCounts::between(&b, &l),
        _ => None,
    };
    state.status = status;
    state.attribution = attribution;
    if status == JobStatus::Converged && !exhausted_short {
        state.progress_pct = 100.0;
    }
    state.throughput = if status == JobStatus::Converged { state.throughput } else { 0.0 };
    let summary = FinalSummary {
        status,
        succeeded: attribution.succeeded,
        failed: attribution.failed,
        elapsed_secs: state.elapsed_secs(at),
        attribution,
        reported,
    };
    state.push_event(
        at,
        format!(
            "{status}: {reason}; succeeded={} failed={} (inferred) after {:.1}s",
            summary.succeeded, summary.failed, summary.elapsed_secs
        ),
    );
    tracing::info!(
        resource_id = %state.request.resource_id,
        status = %status,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_secs = summary.elapsed_secs,
        reason,
        "job finished"
    );
    state.summary = Some(summary);
}
