//! In-process campaign for lifecycle tests under paused tokio time.
//!
//! Each status fetch returns the next scripted `remaining` value (the last
//! one repeats). Submissions are accepted, rejected, or fail outright.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use drainwatch_core::api::{JobSubmitter, SnapshotSource, SubmitReceipt};
use drainwatch_core::clock::{Clock, TokioClock};
use drainwatch_core::config::EstimatorConfig;
use drainwatch_core::controller::LifecycleController;
use drainwatch_core::error::SourceError;
use drainwatch_core::job::{ResourceId, Snapshot};
use drainwatch_core::record_db::MemoryRecords;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Accept,
    Reject,
    Fail,
}

pub struct ScriptedCampaign {
    pub clock: TokioClock,
    script: Mutex<VecDeque<u64>>,
    failing: AtomicBool,
    mode: Mutex<SubmitMode>,
    pub fetches: AtomicU64,
    pub submits: AtomicU64,
}

impl ScriptedCampaign {
    pub fn new(clock: TokioClock, script: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            clock,
            script: Mutex::new(script.iter().copied().collect()),
            failing: AtomicBool::new(false),
            mode: Mutex::new(SubmitMode::Accept),
            fetches: AtomicU64::new(0),
            submits: AtomicU64::new(0),
        })
    }

    /// Replace the remaining script.
    pub fn set_script(&self, script: &[u64]) {
        *self.script.lock().unwrap() = script.iter().copied().collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_submit_mode(&self, mode: SubmitMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reset_fetches(&self) {
        self.fetches.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotSource for ScriptedCampaign {
    async fn fetch_snapshot(&self, _resource_id: &ResourceId) -> Result<Snapshot, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Transport("connection reset".into()));
        }
        let mut script = self.script.lock().unwrap();
        let remaining = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            *script.front().expect("script must not be empty")
        };
        Ok(Snapshot::new(remaining, self.clock.now()))
    }
}

#[async_trait]
impl JobSubmitter for ScriptedCampaign {
    async fn submit_job(
        &self,
        _resource_id: &ResourceId,
        target_count: u64,
    ) -> Result<SubmitReceipt, SourceError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        match *self.mode.lock().unwrap() {
            SubmitMode::Accept => Ok(SubmitReceipt {
                accepted: true,
                message: format!("{target_count} participations queued"),
            }),
            SubmitMode::Reject => Ok(SubmitReceipt {
                accepted: false,
                message: "campaign is not active".into(),
            }),
            SubmitMode::Fail => Err(SourceError::Api {
                status: 503,
                code: None,
                message: "service unavailable".into(),
            }),
        }
    }
}

pub const EPOCH: i64 = 1_700_000_000_000;

pub struct Harness {
    pub campaign: Arc<ScriptedCampaign>,
    pub records: Arc<MemoryRecords>,
    pub clock: TokioClock,
}

impl Harness {
    pub fn new(script: &[u64]) -> Self {
        let clock = TokioClock::starting_at(EPOCH);
        Self {
            campaign: ScriptedCampaign::new(clock, script),
            records: Arc::new(MemoryRecords::new()),
            clock,
        }
    }

    /// A controller over this harness's campaign and records. Several can be
    /// built to simulate a restart that reuses the same durable store.
    pub fn controller(&self) -> LifecycleController {
        LifecycleController::new(
            EstimatorConfig::default(),
            self.campaign.clone(),
            self.campaign.clone(),
            self.records.clone(),
            Arc::new(self.clock),
        )
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}
