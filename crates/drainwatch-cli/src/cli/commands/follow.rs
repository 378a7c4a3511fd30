//! Follows jobs on stdout until they end or the user interrupts.

use anyhow::Result;
use drainwatch_core::controller::LifecycleController;
use drainwatch_core::job::ResourceId;
use drainwatch_core::store::JobReader;
use tokio::task::JoinSet;

use crate::cli::render::{render_progress, render_summary};

pub async fn follow_jobs(ctl: &mut LifecycleController, ids: &[ResourceId]) -> Result<()> {
    let mut watchers = JoinSet::new();
    for id in ids {
        if let Some(reader) = ctl.subscribe(id) {
            watchers.spawn(print_until_terminal(reader));
        }
    }

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            joined = watchers.join_next() => match joined {
                Some(res) => res?,
                None => break,
            },
            res = &mut interrupt => {
                res?;
                // Records stay on disk so the jobs can be resumed.
                ctl.shutdown();
                watchers.shutdown().await;
                println!("Interrupted. Run `drainwatch resume` soon to continue following.");
                return Ok(());
            }
        }
    }

    ctl.prune_finished();
    Ok(())
}

async fn print_until_terminal(mut reader: JobReader) {
    loop {
        let state = reader.current();
        if let Some(summary) = &state.summary {
            println!("{}", render_summary(&state.request.resource_id, summary));
            return;
        }
        println!("{}", render_progress(&state));
        if !reader.changed().await {
            return;
        }
    }
}
