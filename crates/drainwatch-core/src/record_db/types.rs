//! Types stored in the record database.

use serde::{Deserialize, Serialize};

use crate::clock::UnixMillis;
use crate::job::{JobRequest, JobState, Snapshot};

/// Durable subset of a job: enough to rebuild its state after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedJobRecord {
    pub request: JobRequest,
    /// None until the first snapshot has been taken.
    #[serde(default)]
    pub baseline: Option<Snapshot>,
}

impl PersistedJobRecord {
    pub fn new(request: JobRequest) -> Self {
        Self {
            request,
            baseline: None,
        }
    }

    pub fn from_state(state: &JobState) -> Self {
        Self {
            request: state.request.clone(),
            baseline: state.baseline,
        }
    }

    pub fn created_at(&self) -> UnixMillis {
        self.request.created_at
    }

    /// Milliseconds between the job's creation and `now`.
    pub fn age_ms(&self, now: UnixMillis) -> i64 {
        now - self.request.created_at
    }

    /// True if `now` falls inside the resume window (and not before creation).
    pub fn is_fresh(&self, now: UnixMillis, window_ms: i64) -> bool {
        (0..=window_ms).contains(&self.age_ms(now))
    }
}
