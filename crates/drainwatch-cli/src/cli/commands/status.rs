//! `drainwatch status` – list persisted jobs.

use anyhow::Result;
use drainwatch_core::clock::{Clock, SystemClock};
use drainwatch_core::config::DrainwatchConfig;
use drainwatch_core::record_db::RecordDb;

use crate::cli::render::render_record_row;

pub async fn run_status(db: &RecordDb, cfg: &DrainwatchConfig) -> Result<()> {
    let records = db.list().await?;
    if records.is_empty() {
        println!("No persisted jobs.");
        return Ok(());
    }
    let now = SystemClock.now();
    let window_ms = cfg.estimator.resume_window_ms();
    println!(
        "{:<16} {:<8} {:<8} {:<10} {}",
        "RESOURCE", "TARGET", "AGE", "BASELINE", "RESUMABLE"
    );
    for record in &records {
        println!("{}", render_record_row(record, now, window_ms));
    }
    Ok(())
}
