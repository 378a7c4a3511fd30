//! `drainwatch resume` – pick up persisted jobs after an interrupted run.

use anyhow::Result;
use drainwatch_core::controller::LifecycleController;

use super::follow::follow_jobs;

pub async fn run_resume(ctl: &mut LifecycleController) -> Result<()> {
    let resumed = ctl.resume().await?;
    if resumed.is_empty() {
        println!("No resumable jobs.");
        return Ok(());
    }
    for id in &resumed {
        println!("Resumed {id}.");
    }
    follow_jobs(ctl, &resumed).await
}
