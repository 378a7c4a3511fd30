//! Lifecycle controller: start, resume, cancel.
//!
//! Owns one sampler handle and one store per resource id. Any existing
//! sampler for a resource is stopped before another one is started for it,
//! so at most one loop ever samples a given resource.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::api::{JobSubmitter, SnapshotSource};
use crate::clock::Clock;
use crate::config::EstimatorConfig;
use crate::error::StartError;
use crate::estimator::DeltaEstimator;
use crate::job::{JobRequest, JobState, JobStatus, ResourceId};
use crate::record_db::{PersistedJobRecord, RecordStore};
use crate::sampler::{spawn_sampler, SamplerContext, SamplerHandle};
use crate::store::{JobReader, JobStore};

struct TrackedJob {
    store: JobStore,
    sampler: SamplerHandle,
}

impl TrackedJob {
    /// Stop sampling and seal the state. No-op on the state if already terminal.
    fn retire(&mut self, now: i64, reason: &str) {
        self.sampler.stop();
        self.store.abort(now, reason);
    }
}

/// Short view of a tracked job for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct JobListing {
    pub resource_id: ResourceId,
    pub status: JobStatus,
    pub progress_pct: f64,
    pub throughput: f64,
    pub sampler_running: bool,
}

pub struct LifecycleController {
    cfg: EstimatorConfig,
    source: Arc<dyn SnapshotSource>,
    submitter: Arc<dyn JobSubmitter>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    jobs: HashMap<ResourceId, TrackedJob>,
}

impl LifecycleController {
    pub fn new(
        cfg: EstimatorConfig,
        source: Arc<dyn SnapshotSource>,
        submitter: Arc<dyn JobSubmitter>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cfg,
            source,
            submitter,
            records,
            clock,
            jobs: HashMap::new(),
        }
    }

    /// Build a request stamped with the controller's clock.
    pub fn request(&self, resource_id: &str, target_count: u64) -> Result<JobRequest, StartError> {
        Ok(JobRequest::parse(resource_id, target_count, self.clock.now())?)
    }

    /// Validate, submit, and start estimating a job.
    ///
    /// A job already tracked for the same resource is stopped and replaced
    /// once the new one is accepted.
    pub async fn start(&mut self, request: JobRequest) -> Result<JobReader, StartError> {
        request.validate(self.cfg.max_target_count)?;

        let receipt = self
            .submitter
            .submit_job(&request.resource_id, request.target_count)
            .await
            .map_err(|e| {
                tracing::warn!(resource_id = %request.resource_id, "submit failed: {}", e);
                StartError::SubmitFailed(e)
            })?;
        if !receipt.accepted {
            tracing::info!(
                resource_id = %request.resource_id,
                "submit rejected: {}",
                receipt.message
            );
            return Err(StartError::Rejected {
                message: receipt.message,
            });
        }
        tracing::info!(
            resource_id = %request.resource_id,
            target_count = request.target_count,
            "job accepted: {}",
            receipt.message
        );

        Ok(self.begin(request).await)
    }

    /// Start estimating without submitting (the server-side job was started
    /// elsewhere). Validation and replacement rules are the same as `start`.
    pub async fn observe(&mut self, request: JobRequest) -> Result<JobReader, StartError> {
        request.validate(self.cfg.max_target_count)?;
        Ok(self.begin(request).await)
    }

    async fn begin(&mut self, request: JobRequest) -> JobReader {
        self.retire(&request.resource_id, "replaced by a new job");

        let record = PersistedJobRecord::new(request.clone());
        if let Err(e) = self.records.save(&record).await {
            // Estimation still works; only reload survival is lost.
            tracing::warn!(resource_id = %request.resource_id, "save job record failed: {:#}", e);
        }

        let state = JobState::pending(request, &self.cfg);
        self.launch(state)
    }

    /// Resume every persisted job still inside the recency window and drop
    /// the stale ones. Returns the resumed resource ids.
    pub async fn resume(&mut self) -> Result<Vec<ResourceId>> {
        let now = self.clock.now();
        let window_ms = self.cfg.resume_window_ms();
        let mut resumed = Vec::new();

        for record in self.records.list().await? {
            let id = record.request.resource_id.clone();
            if !record.is_fresh(now, window_ms) {
                tracing::debug!(resource_id = %id, age_ms = record.age_ms(now), "discarding stale job record");
                self.records.delete_if_current(&id, record.created_at()).await?;
                continue;
            }
            if record.request.validate(self.cfg.max_target_count).is_err() {
                tracing::warn!(resource_id = %id, "discarding job record with invalid target");
                self.records.delete_if_current(&id, record.created_at()).await?;
                continue;
            }

            if self.is_live(&id, record.created_at()) {
                continue;
            }

            self.retire(&id, "replaced by resumed job");
            let age_ms = record.age_ms(now);
            let state = match record.baseline {
                Some(baseline) => JobState::resumed(record.request, baseline, &self.cfg, now),
                None => JobState::pending(record.request, &self.cfg),
            };
            tracing::info!(resource_id = %id, age_ms, "resuming job");
            self.launch(state);
            resumed.push(id);
        }

        Ok(resumed)
    }

    /// True if this controller already samples the job created at `created_at`.
    fn is_live(&self, resource_id: &ResourceId, created_at: i64) -> bool {
        self.jobs.get(resource_id).is_some_and(|job| {
            let state = job.store.current();
            !state.is_terminal() && state.request.created_at == created_at
        })
    }

    /// Cancel the job for a resource: stop its sampler, mark it `Aborted`,
    /// and drop its persisted record. Returns false if nothing was cancelled.
    pub async fn cancel(&mut self, resource_id: &ResourceId) -> Result<bool> {
        let now = self.clock.now();
        let mut cancelled = false;
        if let Some(job) = self.jobs.get_mut(resource_id) {
            job.sampler.stop();
            cancelled = job.store.abort(now, "cancelled by user");
        }
        let deleted = self.records.delete(resource_id).await?;
        if cancelled || deleted {
            tracing::info!(resource_id = %resource_id, "job cancelled");
        }
        Ok(cancelled || deleted)
    }

    /// Read-only subscription to a tracked job.
    pub fn subscribe(&self, resource_id: &ResourceId) -> Option<JobReader> {
        self.jobs.get(resource_id).map(|j| j.store.subscribe())
    }

    pub fn state(&self, resource_id: &ResourceId) -> Option<JobState> {
        self.jobs.get(resource_id).map(|j| j.store.current())
    }

    /// Ticks made by the sampler currently attached to a resource.
    pub fn sampler_ticks(&self, resource_id: &ResourceId) -> Option<u64> {
        self.jobs.get(resource_id).map(|j| j.sampler.ticks())
    }

    /// All tracked jobs, sorted by resource id.
    pub fn list(&self) -> Vec<JobListing> {
        let mut out: Vec<JobListing> = self
            .jobs
            .iter()
            .map(|(id, job)| {
                let state = job.store.current();
                JobListing {
                    resource_id: id.clone(),
                    status: state.status,
                    progress_pct: state.progress_pct,
                    throughput: state.throughput,
                    sampler_running: job.sampler.is_running(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        out
    }

    /// Forget jobs that reached a terminal state. Returns how many were dropped.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.store.status().is_terminal());
        before - self.jobs.len()
    }

    /// Stop all samplers but keep their records, so a later `resume()` can
    /// pick the jobs up again (the reload path).
    pub fn shutdown(&mut self) {
        for (id, mut job) in self.jobs.drain() {
            job.sampler.stop();
            tracing::debug!(resource_id = %id, "sampler stopped for shutdown");
        }
    }

    fn retire(&mut self, resource_id: &ResourceId, reason: &str) {
        if let Some(mut old) = self.jobs.remove(resource_id) {
            tracing::info!(resource_id = %resource_id, "{}", reason);
            old.retire(self.clock.now(), reason);
        }
    }

    fn launch(&mut self, state: JobState) -> JobReader {
        let id = state.request.resource_id.clone();
        let elapsed_ms = (self.clock.now() - state.request.created_at).max(0) as u64;
        let left = self.cfg.hard_ceiling().saturating_sub(Duration::from_millis(elapsed_ms));

        let store = JobStore::new(state);
        let sampler = spawn_sampler(SamplerContext {
            resource_id: id.clone(),
            source: Arc::clone(&self.source),
            writer: store.writer(),
            estimator: DeltaEstimator::new(self.cfg.hard_ceiling_ms()),
            records: Some(Arc::clone(&self.records)),
            clock: Arc::clone(&self.clock),
            interval: self.cfg.tick_interval(),
            deadline: tokio::time::Instant::now() + left,
        });
        let reader = store.subscribe();
        self.jobs.insert(id, TrackedJob { store, sampler });
        reader
    }
}
