//! CLI for the drainwatch progress estimator.

mod commands;
mod render;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drainwatch_core::api::HttpCampaignApi;
use drainwatch_core::clock::SystemClock;
use drainwatch_core::config::{self, DrainwatchConfig};
use drainwatch_core::controller::LifecycleController;
use drainwatch_core::record_db::{MemoryRecords, RecordDb, RecordStore};

use commands::{run_cancel, run_resume, run_status, run_submit, run_watch};

/// Top-level CLI for drainwatch.
#[derive(Debug, Parser)]
#[command(name = "drainwatch")]
#[command(about = "drainwatch: estimate progress of server-side bulk jobs from resource snapshots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit a job for a resource and follow its progress until it ends.
    Watch {
        /// Resource (campaign) identifier.
        resource: String,
        /// Number of units the job should consume.
        #[arg(long, value_name = "N")]
        target: u64,
        /// Do not submit; only estimate a job started elsewhere.
        #[arg(long)]
        no_submit: bool,
    },

    /// Submit a job and persist it without following; `resume` picks it up.
    Submit {
        /// Resource (campaign) identifier.
        resource: String,
        /// Number of units the job should consume.
        #[arg(long, value_name = "N")]
        target: u64,
    },

    /// Resume jobs persisted by an interrupted run and follow them.
    Resume,

    /// Cancel a job and drop its persisted record.
    Cancel {
        /// Resource (campaign) identifier.
        resource: String,
    },

    /// List persisted (resumable) jobs.
    Status,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Watch {
                resource,
                target,
                no_submit,
            } => {
                let mut ctl = controller(&cfg, open_records_or_memory().await);
                run_watch(&mut ctl, &resource, target, no_submit).await?;
            }
            CliCommand::Submit { resource, target } => {
                let db = RecordDb::open_default().await?;
                let mut ctl = controller(&cfg, Arc::new(db.clone()));
                run_submit(&mut ctl, &db, &resource, target).await?;
            }
            CliCommand::Resume => {
                let db = RecordDb::open_default().await?;
                let mut ctl = controller(&cfg, Arc::new(db));
                run_resume(&mut ctl).await?;
            }
            CliCommand::Cancel { resource } => {
                let db = RecordDb::open_default().await?;
                let mut ctl = controller(&cfg, Arc::new(db));
                run_cancel(&mut ctl, &resource).await?;
            }
            CliCommand::Status => {
                let db = RecordDb::open_default().await?;
                run_status(&db, &cfg).await?;
            }
        }

        Ok(())
    }
}

fn controller(cfg: &DrainwatchConfig, records: Arc<dyn RecordStore>) -> LifecycleController {
    let api = Arc::new(HttpCampaignApi::new(cfg.api.clone()));
    LifecycleController::new(
        cfg.estimator.clone(),
        api.clone(),
        api,
        records,
        Arc::new(SystemClock),
    )
}

/// Jobs still run without the record database; they just cannot be resumed.
async fn open_records_or_memory() -> Arc<dyn RecordStore> {
    match RecordDb::open_default().await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::warn!("record database unavailable, job will not survive a restart: {:#}", e);
            Arc::new(MemoryRecords::new())
        }
    }
}

#[cfg(test)]
mod tests;
