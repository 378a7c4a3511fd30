//! Job data model: requests, snapshots, and the estimator's working state.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::{millis_to_secs, UnixMillis};
use crate::config::EstimatorConfig;
use crate::error::RequestError;

/// Opaque identifier of the monitored resource (e.g. a campaign id).
///
/// Restricted to `[A-Za-z0-9_.-]` so it can be substituted into URL paths
/// and used as a storage key as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RequestError::EmptyResourceId);
        }
        let valid = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(RequestError::InvalidResourceId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ResourceId::parse(&value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Immutable intent: drain `target_count` units from `resource_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub resource_id: ResourceId,
    /// Caller-supplied, not verified by the server.
    pub target_count: u64,
    pub created_at: UnixMillis,
}

impl JobRequest {
    pub fn new(resource_id: ResourceId, target_count: u64, created_at: UnixMillis) -> Self {
        Self {
            resource_id,
            target_count,
            created_at,
        }
    }

    /// Parse the resource id and build a request in one step.
    pub fn parse(
        resource_id: &str,
        target_count: u64,
        created_at: UnixMillis,
    ) -> Result<Self, RequestError> {
        Ok(Self::new(
            ResourceId::parse(resource_id)?,
            target_count,
            created_at,
        ))
    }

    /// Bounds check applied by `start()`.
    pub fn validate(&self, max_target_count: u64) -> Result<(), RequestError> {
        if self.target_count == 0 {
            return Err(RequestError::ZeroTarget);
        }
        if self.target_count > max_target_count {
            return Err(RequestError::TargetTooLarge {
                requested: self.target_count,
                max: max_target_count,
            });
        }
        Ok(())
    }
}

/// One observation of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Units left in the resource.
    pub remaining: u64,
    /// Server-side cumulative success count, when the source exposes it.
    #[serde(default)]
    pub succeeded: Option<u64>,
    /// Server-side cumulative failure count, when the source exposes it.
    #[serde(default)]
    pub failed: Option<u64>,
    pub observed_at: UnixMillis,
}

impl Snapshot {
    pub fn new(remaining: u64, observed_at: UnixMillis) -> Self {
        Self {
            remaining,
            succeeded: None,
            failed: None,
            observed_at,
        }
    }

    pub fn with_counts(mut self, succeeded: u64, failed: u64) -> Self {
        self.succeeded = Some(succeeded);
        self.failed = Some(failed);
        self
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the first successful snapshot.
    Pending,
    Running,
    /// Target reached or resource exhausted.
    Converged,
    TimedOut,
    Aborted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Converged | JobStatus::TimedOut | JobStatus::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Converged => "converged",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a success/failure split came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionBasis {
    /// Derived client-side from stock consumption. Failures are only ever
    /// inferred from the resource running dry before the target was met, so
    /// failures with stock left (validation errors, ...) are invisible here.
    Inferred,
}

/// Success/failure split of the requested units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub succeeded: u64,
    pub failed: u64,
    /// Units neither attributed success nor failure (job ended early).
    pub unresolved: u64,
    pub basis: AttributionBasis,
}

impl Attribution {
    pub(crate) fn inferred(target: u64, consumed: u64, exhausted_short: bool) -> Self {
        let succeeded = consumed.min(target);
        let failed = if exhausted_short {
            target - succeeded
        } else {
            0
        };
        Self {
            succeeded,
            failed,
            unresolved: target - succeeded - failed,
            basis: AttributionBasis::Inferred,
        }
    }
}

/// Server-reported counter deltas since the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedCounts {
    pub succeeded: u64,
    pub failed: u64,
}

impl ReportedCounts {
    pub(crate) fn between(baseline: &Snapshot, latest: &Snapshot) -> Option<Self> {
        Some(Self {
            succeeded: latest.succeeded?.saturating_sub(baseline.succeeded?),
            failed: latest.failed?.saturating_sub(baseline.failed?),
        })
    }
}

/// Emitted once when a job reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub status: JobStatus,
    pub succeeded: u64,
    pub failed: u64,
    pub elapsed_secs: f64,
    pub attribution: Attribution,
    /// Reported by the server, when the source exposes counters.
    pub reported: Option<ReportedCounts>,
}

/// A human-readable line in the job's running log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickEvent {
    pub at: UnixMillis,
    pub message: String,
}

/// One throughput sample kept for charting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputPoint {
    pub observed_at: UnixMillis,
    pub throughput: f64,
    pub succeeded: Option<u64>,
    pub failed: Option<u64>,
}

/// Working state of one job. Mutated only through the store's writer.
#[derive(Debug, Clone)]
pub struct JobState {
    pub request: JobRequest,
    /// First snapshot after (re)start; never replaced once set.
    pub baseline: Option<Snapshot>,
    pub latest: Option<Snapshot>,
    /// High-water mark of `baseline.remaining - latest.remaining`.
    pub consumed: u64,
    pub progress_pct: f64,
    /// Units per second between the last two in-order samples.
    pub throughput: f64,
    pub status: JobStatus,
    pub attribution: Attribution,
    pub summary: Option<FinalSummary>,
    /// Successful snapshots applied.
    pub samples: u64,
    /// Fetch attempts that failed.
    pub failed_fetches: u64,
    pub events: VecDeque<TickEvent>,
    pub history: VecDeque<ThroughputPoint>,
    event_capacity: usize,
    history_capacity: usize,
}

impl JobState {
    /// Fresh job waiting for its first snapshot.
    pub fn pending(request: JobRequest, cfg: &EstimatorConfig) -> Self {
        let attribution = Attribution::inferred(request.target_count, 0, false);
        let mut state = Self {
            request,
            baseline: None,
            latest: None,
            consumed: 0,
            progress_pct: 0.0,
            throughput: 0.0,
            status: JobStatus::Pending,
            attribution,
            summary: None,
            samples: 0,
            failed_fetches: 0,
            events: VecDeque::new(),
            history: VecDeque::new(),
            event_capacity: cfg.event_log_capacity.max(1),
            history_capacity: cfg.history_capacity.max(1),
        };
        let at = state.request.created_at;
        let msg = format!(
            "job created: target={} on {}",
            state.request.target_count, state.request.resource_id
        );
        state.push_event(at, msg);
        state
    }

    /// Job reconstructed from a persisted baseline; consumption keeps being
    /// measured against that baseline.
    pub fn resumed(
        request: JobRequest,
        baseline: Snapshot,
        cfg: &EstimatorConfig,
        now: UnixMillis,
    ) -> Self {
        let mut state = Self::pending(request, cfg);
        state.baseline = Some(baseline);
        state.latest = Some(baseline);
        state.status = JobStatus::Running;
        state.push_event(
            now,
            format!("resumed from persisted baseline remaining={}", baseline.remaining),
        );
        state
    }

    /// Seconds since the job was created, measured at `now`.
    pub fn elapsed_secs(&self, now: UnixMillis) -> f64 {
        millis_to_secs((now - self.request.created_at).max(0))
    }

    /// Estimated seconds until the target is reached at the current rate.
    pub fn eta_secs(&self) -> Option<f64> {
        let left = self.request.target_count.saturating_sub(self.consumed);
        if left == 0 {
            return Some(0.0);
        }
        if self.throughput <= 0.0 {
            return None;
        }
        Some(left as f64 / self.throughput)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn push_event(&mut self, at: UnixMillis, message: String) {
        if self.events.len() == self.event_capacity {
            self.events.pop_front();
        }
        self.events.push_back(TickEvent { at, message });
    }

    pub(crate) fn push_history(&mut self, point: ThroughputPoint) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(point);
    }
}
