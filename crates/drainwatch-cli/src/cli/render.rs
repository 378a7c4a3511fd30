//! Plain-text rendering of job progress for the terminal.

use drainwatch_core::clock::{millis_to_secs, UnixMillis};
use drainwatch_core::job::{FinalSummary, JobState, JobStatus, ResourceId};
use drainwatch_core::record_db::PersistedJobRecord;

pub fn render_progress(state: &JobState) -> String {
    let id = &state.request.resource_id;
    if state.status == JobStatus::Pending {
        return format!("[{id}] waiting for first snapshot");
    }
    let remaining = state
        .latest
        .map(|s| s.remaining.to_string())
        .unwrap_or_else(|| "?".to_string());
    let eta = state
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    let mut line = format!(
        "[{id}] {:>5.1}%  {}/{}  {:.1}/s  remaining {}  ETA {}",
        state.progress_pct,
        state.consumed,
        state.request.target_count,
        state.throughput,
        remaining,
        eta
    );
    if state.failed_fetches > 0 {
        line.push_str(&format!("  ({} failed fetches)", state.failed_fetches));
    }
    line
}

pub fn render_summary(id: &ResourceId, summary: &FinalSummary) -> String {
    let mut line = format!(
        "[{id}] {}: succeeded {} / failed {} (inferred) in {:.1}s",
        summary.status, summary.succeeded, summary.failed, summary.elapsed_secs
    );
    if summary.attribution.unresolved > 0 {
        line.push_str(&format!(", {} unresolved", summary.attribution.unresolved));
    }
    if let Some(reported) = summary.reported {
        line.push_str(&format!(
            "; server reported +{} ok / +{} failed",
            reported.succeeded, reported.failed
        ));
    }
    line
}

pub fn render_record_row(record: &PersistedJobRecord, now: UnixMillis, window_ms: i64) -> String {
    let baseline = record
        .baseline
        .map(|b| b.remaining.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<16} {:<8} {:<8} {:<10} {}",
        record.request.resource_id.as_str(),
        record.request.target_count,
        format!("{:.0}s", millis_to_secs(record.age_ms(now))),
        baseline,
        if record.is_fresh(now, window_ms) { "yes" } else { "no" }
    )
}
