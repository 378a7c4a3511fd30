//! `drainwatch watch` – submit a job and follow it.

use anyhow::Result;
use drainwatch_core::controller::LifecycleController;

use super::follow::follow_jobs;

pub async fn run_watch(
    ctl: &mut LifecycleController,
    resource: &str,
    target: u64,
    no_submit: bool,
) -> Result<()> {
    let request = ctl.request(resource, target)?;
    let id = request.resource_id.clone();

    if no_submit {
        ctl.observe(request).await?;
        println!("Watching {id} (target {target}, not submitted).");
    } else {
        ctl.start(request).await?;
        println!("Job accepted for {id} (target {target}).");
    }

    follow_jobs(ctl, &[id]).await
}
