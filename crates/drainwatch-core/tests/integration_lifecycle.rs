//! Integration tests: lifecycle controller driving samplers under paused time.
//!
//! The scripted campaign answers instantly and records are kept in memory,
//! so every tick lands exactly on the tokio timer schedule.

mod common;

use std::time::Duration;

use common::scripted::{Harness, SubmitMode};
use drainwatch_core::error::{RequestError, StartError};
use drainwatch_core::job::{AttributionBasis, JobRequest, JobStatus, ResourceId, Snapshot};
use drainwatch_core::record_db::{PersistedJobRecord, RecordStore};
use tokio::time::{sleep, Instant};

fn id(raw: &str) -> ResourceId {
    ResourceId::parse(raw).unwrap()
}

#[tokio::test(start_paused = true)]
async fn end_to_end_scenario_converges_with_expected_progress() {
    let h = Harness::new(&[10_000, 9_000, 7_000, 0]);
    let mut ctl = h.controller();
    let req = ctl.request("42", 10_000).unwrap();
    let mut reader = ctl.start(req).await.unwrap();

    sleep(Duration::from_millis(2_010)).await;
    let state = reader.current();
    assert_eq!(state.status, JobStatus::Running);
    assert_eq!(state.consumed, 3_000);
    assert!((state.progress_pct - 30.0).abs() < 1e-9);
    assert!((state.throughput - 2_000.0).abs() < 1e-9);

    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::Converged);
    assert_eq!(summary.succeeded, 10_000);
    assert_eq!(summary.failed, 0);
    assert!((summary.elapsed_secs - 3.0).abs() < 1e-9);
    assert_eq!(summary.attribution.basis, AttributionBasis::Inferred);
    assert_eq!(reader.current().progress_pct, 100.0);
    assert_eq!(h.campaign.fetches(), 4);
    assert!(h.records.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhaustion_before_target_splits_success_and_failure() {
    let h = Harness::new(&[400, 150, 0]);
    let mut ctl = h.controller();
    let req = ctl.request("7", 1_000).unwrap();
    let mut reader = ctl.start(req).await.unwrap();

    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::Converged);
    assert_eq!((summary.succeeded, summary.failed), (400, 600));
    assert_eq!(summary.attribution.unresolved, 0);
    assert!((reader.current().progress_pct - 40.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn second_start_leaves_exactly_one_live_sampler() {
    let h = Harness::new(&[1_000_000]);
    let mut ctl = h.controller();

    let first = ctl.request("5", 50_000).unwrap();
    let first_reader = ctl.start(first).await.unwrap();
    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.campaign.fetches(), 3);

    let second = ctl.request("5", 60_000).unwrap();
    let second_reader = ctl.start(second).await.unwrap();
    h.campaign.reset_fetches();

    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(h.campaign.fetches(), 11);
    assert_eq!(ctl.sampler_ticks(&id("5")), Some(11));

    assert_eq!(first_reader.current().status, JobStatus::Aborted);
    assert_eq!(second_reader.current().status, JobStatus::Running);
    assert_eq!(second_reader.current().request.target_count, 60_000);
    assert_eq!(ctl.list().len(), 1);
    assert_eq!(h.campaign.submits.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn resumed_job_measures_against_persisted_baseline() {
    let h = Harness::new(&[800, 700, 500]);
    let now = h.now();
    let mut record = PersistedJobRecord::new(JobRequest::parse("9", 500, now - 30_000).unwrap());
    record.baseline = Some(Snapshot::new(1_000, now - 29_000));
    h.records.save(&record).await.unwrap();

    let mut ctl = h.controller();
    let resumed = ctl.resume().await.unwrap();
    assert_eq!(resumed, vec![id("9")]);
    let mut reader = ctl.subscribe(&id("9")).unwrap();

    sleep(Duration::from_millis(10)).await;
    let state = reader.current();
    assert_eq!(state.status, JobStatus::Running);
    assert_eq!(state.baseline.unwrap().remaining, 1_000);
    assert_eq!(state.consumed, 200);
    assert!((state.progress_pct - 40.0).abs() < 1e-9);

    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(reader.current().consumed, 300);

    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::Converged);
    assert_eq!(summary.succeeded, 500);
    assert!((summary.elapsed_secs - 32.0).abs() < 1e-9);
    assert!(h.records.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resumed_job_keeps_its_hard_ceiling() {
    let h = Harness::new(&[900]);
    let now = h.now();
    let mut record = PersistedJobRecord::new(JobRequest::parse("9", 500, now - 30_000).unwrap());
    record.baseline = Some(Snapshot::new(1_000, now - 29_000));
    h.records.save(&record).await.unwrap();

    let mut ctl = h.controller();
    ctl.resume().await.unwrap();
    let mut reader = ctl.subscribe(&id("9")).unwrap();

    let started = Instant::now();
    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::TimedOut);
    assert!((summary.elapsed_secs - 120.0).abs() < 1e-9);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(90) && waited < Duration::from_secs(91));
}

#[tokio::test(start_paused = true)]
async fn reload_picks_up_job_from_durable_store() {
    let h = Harness::new(&[5_000, 4_900, 4_800]);
    let mut before = h.controller();
    let req = before.request("3", 1_000).unwrap();
    before.start(req).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    before.shutdown();
    drop(before);

    let stored = h.records.load(&id("3")).await.unwrap().unwrap();
    assert_eq!(stored.baseline.unwrap().remaining, 5_000);

    sleep(Duration::from_secs(5)).await;
    let mut after = h.controller();
    assert_eq!(after.resume().await.unwrap(), vec![id("3")]);
    sleep(Duration::from_millis(10)).await;

    let state = after.state(&id("3")).unwrap();
    assert_eq!(state.baseline.unwrap().remaining, 5_000);
    assert_eq!(state.consumed, 200);
    assert_eq!(state.status, JobStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn job_that_never_converges_times_out_and_stops_ticking() {
    let h = Harness::new(&[1_000]);
    let mut ctl = h.controller();
    let req = ctl.request("11", 500).unwrap();
    let mut reader = ctl.start(req).await.unwrap();

    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::TimedOut);
    assert!((summary.elapsed_secs - 120.0).abs() < 1e-9);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(reader.current().throughput, 0.0);

    let fetches = h.campaign.fetches();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.campaign.fetches(), fetches);
    assert!(h.records.list().await.unwrap().is_empty());
    assert!(!ctl.list()[0].sampler_running);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_skip_ticks_without_ending_the_job() {
    let h = Harness::new(&[1_000, 900, 800, 700]);
    let mut ctl = h.controller();
    let req = ctl.request("12", 250).unwrap();
    let mut reader = ctl.start(req).await.unwrap();

    sleep(Duration::from_millis(10)).await;
    h.campaign.set_failing(true);
    sleep(Duration::from_millis(3_000)).await;
    let state = reader.current();
    assert_eq!(state.status, JobStatus::Running);
    assert_eq!(state.failed_fetches, 3);
    assert_eq!(state.latest.unwrap().remaining, 1_000);

    h.campaign.set_failing(false);
    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::Converged);
    assert_eq!(summary.succeeded, 250);
}

#[tokio::test(start_paused = true)]
async fn rejected_or_failed_submit_starts_nothing() {
    let h = Harness::new(&[1_000]);
    let mut ctl = h.controller();

    h.campaign.set_submit_mode(SubmitMode::Reject);
    let req = ctl.request("1", 10).unwrap();
    match ctl.start(req).await {
        Err(StartError::Rejected { message }) => assert_eq!(message, "campaign is not active"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("job should not start"),
    }

    h.campaign.set_submit_mode(SubmitMode::Fail);
    let req = ctl.request("1", 10).unwrap();
    assert!(matches!(ctl.start(req).await, Err(StartError::SubmitFailed(_))));

    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.campaign.fetches(), 0);
    assert!(ctl.list().is_empty());
    assert!(h.records.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_resubmit_keeps_existing_job_running() {
    let h = Harness::new(&[1_000_000]);
    let mut ctl = h.controller();
    let req = ctl.request("1", 10_000).unwrap();
    let reader = ctl.start(req).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;

    h.campaign.set_submit_mode(SubmitMode::Reject);
    let again = ctl.request("1", 20_000).unwrap();
    assert!(ctl.start(again).await.is_err());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(reader.current().status, JobStatus::Running);
    assert_eq!(ctl.sampler_ticks(&id("1")), Some(4));
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_are_refused_before_submission() {
    let h = Harness::new(&[1_000]);
    let mut ctl = h.controller();

    let zero = ctl.request("1", 0).unwrap();
    assert!(matches!(
        ctl.start(zero).await,
        Err(StartError::Invalid(RequestError::ZeroTarget))
    ));
    let huge = ctl.request("1", 100_001).unwrap();
    assert!(matches!(
        ctl.start(huge).await,
        Err(StartError::Invalid(RequestError::TargetTooLarge { requested: 100_001, max: 100_000 }))
    ));
    assert!(matches!(
        ctl.request("not an id", 5),
        Err(StartError::Invalid(RequestError::InvalidResourceId(_)))
    ));
    let edge = ctl.request("1", 100_000).unwrap();
    assert!(ctl.start(edge).await.is_ok());
    assert_eq!(h.campaign.submits.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_clears_record_and_stops_sampling() {
    let h = Harness::new(&[1_000, 990, 980, 970]);
    let mut ctl = h.controller();
    let req = ctl.request("8", 500).unwrap();
    let mut reader = ctl.start(req).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;

    assert!(ctl.cancel(&id("8")).await.unwrap());
    let summary = reader.wait_terminal().await.unwrap();
    assert_eq!(summary.status, JobStatus::Aborted);
    assert_eq!(reader.current().consumed, 10);
    assert!(h.records.load(&id("8")).await.unwrap().is_none());

    let fetches = h.campaign.fetches();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.campaign.fetches(), fetches);
    assert_eq!(reader.current().status, JobStatus::Aborted);
}

#[tokio::test(start_paused = true)]
async fn stale_records_are_dropped_and_fresh_ones_resumed() {
    let h = Harness::new(&[1_000]);
    let now = h.now();
    let stale = PersistedJobRecord::new(JobRequest::parse("old", 10, now - 120_001).unwrap());
    let edge = PersistedJobRecord::new(JobRequest::parse("edge", 10, now - 120_000).unwrap());
    h.records.save(&stale).await.unwrap();
    h.records.save(&edge).await.unwrap();

    let mut ctl = h.controller();
    let resumed = ctl.resume().await.unwrap();
    assert_eq!(resumed, vec![id("edge")]);
    assert!(h.records.load(&id("old")).await.unwrap().is_none());
    assert_eq!(ctl.state(&id("edge")).unwrap().status, JobStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn jobs_on_different_resources_are_independent() {
    let h = Harness::new(&[1_000_000]);
    let mut ctl = h.controller();
    let a = ctl.request("a", 100).unwrap();
    let b = ctl.request("b", 100).unwrap();
    let reader_a = ctl.start(a).await.unwrap();
    let reader_b = ctl.start(b).await.unwrap();
    sleep(Duration::from_millis(1_500)).await;

    ctl.cancel(&id("a")).await.unwrap();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(reader_a.current().status, JobStatus::Aborted);
    assert_eq!(reader_b.current().status, JobStatus::Running);
    assert_eq!(ctl.sampler_ticks(&id("b")), Some(4));
    assert!(h.records.load(&id("b")).await.unwrap().is_some());

    assert_eq!(ctl.prune_finished(), 1);
    let ids: Vec<String> = ctl.list().iter().map(|j| j.resource_id.to_string()).collect();
    assert_eq!(ids, ["b"]);
}
