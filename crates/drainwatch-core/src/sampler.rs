//! Sampler: one tokio task per job that pulls a snapshot every tick.
//!
//! The first fetch happens immediately (it fixes the baseline), then once per
//! interval until the job is terminal or the hard-ceiling deadline fires.
//! Fetch errors only skip the tick. Stopping aborts the task itself; the
//! store rejects writes once the job is terminal, so a tick already in flight
//! when the controller aborts the job cannot bring it back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::SnapshotSource;
use crate::clock::Clock;
use crate::estimator::{DeltaEstimator, TickOutcome};
use crate::job::ResourceId;
use crate::record_db::RecordStore;
use crate::store::JobWriter;

/// Everything a sampler loop needs; moved into the task.
pub(crate) struct SamplerContext {
    pub(crate) resource_id: ResourceId,
    pub(crate) source: Arc<dyn SnapshotSource>,
    pub(crate) writer: JobWriter,
    pub(crate) estimator: DeltaEstimator,
    pub(crate) records: Option<Arc<dyn RecordStore>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) interval: Duration,
    /// Hard ceiling, already adjusted for time spent before a resume.
    pub(crate) deadline: Instant,
}

/// Owner of a running sampler task. Dropping the handle stops the loop.
pub struct SamplerHandle {
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl SamplerHandle {
    /// Abort the loop. Idempotent; no fetch starts after this returns.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Number of ticks (fetch attempts) this loop has made.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn spawn_sampler(ctx: SamplerContext) -> SamplerHandle {
    let ticks = Arc::new(AtomicU64::new(0));
    let task = tokio::spawn(run_sampler(ctx, Arc::clone(&ticks)));
    SamplerHandle {
        task: Some(task),
        ticks,
    }
}

async fn run_sampler(ctx: SamplerContext, ticks: Arc<AtomicU64>) {
    let id = &ctx.resource_id;
    let mut interval = tokio::time::interval(ctx.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep_until(ctx.deadline);
    tokio::pin!(deadline);

    tracing::debug!(resource_id = %id, interval_ms = ctx.interval.as_millis() as u64, "sampler started");

    loop {
        tokio::select! {
            // A tick due at the same instant as the deadline still runs, so
            // convergence observed on that tick wins over the timeout.
            biased;
            _ = interval.tick() => {}
            _ = &mut deadline => {
                if ctx.writer.time_out(&ctx.estimator, ctx.clock.now()) {
                    tracing::warn!(resource_id = %id, "hard ceiling reached; sampler stopping");
                    clear_record(&ctx).await;
                }
                break;
            }
        }

        if ctx.writer.is_terminal() {
            break;
        }
        ticks.fetch_add(1, Ordering::Relaxed);

        let fetched = tokio::time::timeout_at(ctx.deadline, ctx.source.fetch_snapshot(id)).await;
        let snapshot = match fetched {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::warn!(resource_id = %id, "snapshot fetch failed: {}", e);
                ctx.writer.note_fetch_failure(ctx.clock.now(), &e.to_string());
                continue;
            }
            // Deadline passed mid-fetch; the next select picks it up.
            Err(_) => continue,
        };

        match ctx.writer.apply_snapshot(&ctx.estimator, snapshot) {
            TickOutcome::Baseline => {
                tracing::info!(resource_id = %id, remaining = snapshot.remaining, "baseline established");
                persist_baseline(&ctx).await;
            }
            TickOutcome::Updated => {
                tracing::trace!(resource_id = %id, remaining = snapshot.remaining, "tick applied");
            }
            TickOutcome::Terminal(status) => {
                tracing::info!(resource_id = %id, status = %status, "job reached terminal state");
                clear_record(&ctx).await;
                break;
            }
            TickOutcome::Ignored => break,
        }
    }

    tracing::debug!(resource_id = %id, ticks = ticks.load(Ordering::Relaxed), "sampler exited");
}

async fn persist_baseline(ctx: &SamplerContext) {
    let Some(db) = &ctx.records else { return };
    let record = ctx.writer.record();
    match db.update_if_current(&record).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(resource_id = %ctx.resource_id, "record superseded; baseline not saved"),
        Err(e) => tracing::warn!(resource_id = %ctx.resource_id, "persist baseline failed: {:#}", e),
    }
}

async fn clear_record(ctx: &SamplerContext) {
    let Some(db) = &ctx.records else { return };
    let created_at = ctx.writer.record().request.created_at;
    if let Err(e) = db.delete_if_current(&ctx.resource_id, created_at).await {
        tracing::warn!(resource_id = %ctx.resource_id, "clear job record failed: {:#}", e);
    }
}
