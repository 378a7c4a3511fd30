//! Campaign API over HTTP (curl).
//!
//! curl is blocking, so every request runs on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::envelope::{parse_status_response, parse_submit_response};
use super::{JobSubmitter, SnapshotSource, SubmitReceipt};
use crate::clock::{Clock, SystemClock};
use crate::config::ApiConfig;
use crate::error::SourceError;
use crate::job::{ResourceId, Snapshot};

/// Raw response: status code and body.
struct RawResponse {
    code: u32,
    body: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    connect: Duration,
    total: Duration,
}

/// Performs one request. Runs in the current thread; call from `spawn_blocking`.
fn perform(
    url: &str,
    post_body: Option<&[u8]>,
    timeouts: Timeouts,
) -> Result<RawResponse, SourceError> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(timeouts.connect)?;
    easy.timeout(timeouts.total)?;

    let mut list = curl::easy::List::new();
    list.append("Accept: application/json")?;
    if let Some(payload) = post_body {
        list.append("Content-Type: application/json")?;
        easy.post(true)?;
        easy.post_fields_copy(payload)?;
    }
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok(RawResponse { code, body })
}

async fn perform_blocking(
    url: String,
    post_body: Option<Vec<u8>>,
    timeouts: Timeouts,
) -> Result<RawResponse, SourceError> {
    tokio::task::spawn_blocking(move || perform(&url, post_body.as_deref(), timeouts))
        .await
        .map_err(|e| SourceError::Task(e.to_string()))?
}

/// Snapshot source and job submitter backed by the campaign REST API.
#[derive(Clone)]
pub struct HttpCampaignApi {
    cfg: ApiConfig,
    clock: Arc<dyn Clock>,
}

impl HttpCampaignApi {
    pub fn new(cfg: ApiConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: ApiConfig, clock: Arc<dyn Clock>) -> Self {
        Self { cfg, clock }
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.cfg.connect_timeout_secs.max(1)),
            total: Duration::from_secs(self.cfg.request_timeout_secs.max(1)),
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpCampaignApi {
    async fn fetch_snapshot(&self, resource_id: &ResourceId) -> Result<Snapshot, SourceError> {
        let url = self.cfg.status_url(resource_id.as_str());
        let resp = perform_blocking(url, None, self.timeouts()).await?;
        // Stamped on arrival: the server does not timestamp its status.
        let observed_at = self.clock.now();
        parse_status_response(resp.code, &resp.body, observed_at)
    }
}

#[async_trait]
impl JobSubmitter for HttpCampaignApi {
    async fn submit_job(
        &self,
        resource_id: &ResourceId,
        target_count: u64,
    ) -> Result<SubmitReceipt, SourceError> {
        let url = self.cfg.submit_url(resource_id.as_str());
        let payload = serde_json::to_vec(&serde_json::json!({ "count": target_count }))?;
        let resp = perform_blocking(url, Some(payload), self.timeouts()).await?;
        let receipt = parse_submit_response(resp.code, &resp.body)?;
        tracing::debug!(
            resource_id = %resource_id,
            target_count,
            accepted = receipt.accepted,
            http_status = resp.code,
            "submit response: {}",
            receipt.message
        );
        Ok(receipt)
    }
}
