//! Collaborator ports: where snapshots come from and where jobs are submitted.
//!
//! The estimator core only depends on these traits. `HttpCampaignApi` is the
//! production implementation against the campaign REST API.

mod envelope;
mod http;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::job::{ResourceId, Snapshot};

pub use envelope::{parse_status_response, parse_submit_response, CampaignStatus};
pub use http::HttpCampaignApi;

/// Pull-based accessor for the monitored resource. Must be cheap to call
/// repeatedly; no ordering or freshness guarantees are assumed.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, resource_id: &ResourceId) -> Result<Snapshot, SourceError>;
}

/// Server's answer to a job submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub accepted: bool,
    pub message: String,
}

/// Asks the server to start draining a resource. Only acceptance is
/// awaited, never completion.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit_job(
        &self,
        resource_id: &ResourceId,
        target_count: u64,
    ) -> Result<SubmitReceipt, SourceError>;
}
