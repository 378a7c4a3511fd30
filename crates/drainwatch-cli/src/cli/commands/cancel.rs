//! `drainwatch cancel` – abort a job and forget its record.

use anyhow::Result;
use drainwatch_core::controller::LifecycleController;
use drainwatch_core::job::ResourceId;

pub async fn run_cancel(ctl: &mut LifecycleController, resource: &str) -> Result<()> {
    let id = ResourceId::parse(resource)?;
    if ctl.cancel(&id).await? {
        println!("Cancelled job for {id}.");
    } else {
        println!("No job for {id}.");
    }
    Ok(())
}
