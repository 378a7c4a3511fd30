//! `drainwatch submit` – submit a job and leave it for `resume`.

use std::time::Duration;

use anyhow::Result;
use drainwatch_core::controller::LifecycleController;
use drainwatch_core::job::JobStatus;
use drainwatch_core::record_db::{PersistedJobRecord, RecordDb};

use crate::cli::render::render_summary;

const BASELINE_WAIT: Duration = Duration::from_secs(15);

pub async fn run_submit(
    ctl: &mut LifecycleController,
    db: &RecordDb,
    resource: &str,
    target: u64,
) -> Result<()> {
    let request = ctl.request(resource, target)?;
    let id = request.resource_id.clone();
    let mut reader = ctl.start(request).await?;

    // Stay until the baseline is known, otherwise a later resume would
    // measure from whatever stock is left by then.
    let waited = tokio::time::timeout(BASELINE_WAIT, async {
        while reader.current().status == JobStatus::Pending {
            if !reader.changed().await {
                break;
            }
        }
    })
    .await;
    ctl.shutdown();

    let state = reader.current();
    if let Some(summary) = &state.summary {
        println!("{}", render_summary(&id, summary));
        return Ok(());
    }
    match (waited, state.baseline) {
        (Ok(()), Some(baseline)) => {
            // The sampler may have been stopped mid-write.
            db.update_if_current(&PersistedJobRecord::from_state(&state)).await?;
            println!(
                "Job accepted for {id} (target {target}, baseline {}). Follow it with `drainwatch resume`.",
                baseline.remaining
            );
        }
        _ => {
            tracing::warn!(resource_id = %id, "no baseline before leaving; resume will take a new one");
            println!("Job accepted for {id} (target {target}); no baseline yet.");
        }
    }
    Ok(())
}
