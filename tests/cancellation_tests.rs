//! Tree cancellation with in-flight migration activities.

mod common;

use common::builders::*;
use consolidation_migration::host::InstanceId;
use consolidation_migration::models::{Bounds, MigrationStatus, OutcomeStatus, RunStatus};
use std::time::Duration;

fn cancellation_fixture(grace_ms: u64, fetch_delay: Duration) -> MigrationFixture {
    let mut config = fast_config();
    config.execution.max_concurrent_activities = 2;
    config.execution.cancellation_grace_period_ms = grace_ms;
    let fixture = MigrationFixture::with_config(config);
    fixture.seed_leads("081", "11", 10);
    fixture.source.set_fetch_delay(Some(fetch_delay));
    fixture
}

#[tokio::test]
async fn test_cancel_abandons_in_flight_work_after_grace_period() {
    let fixture = cancellation_fixture(50, Duration::from_secs(2));
    let run_id = InstanceId::new("run-cancel-abandon");

    let runner = fixture.runner.clone();
    let id = run_id.clone();
    let run = tokio::spawn(async move { runner.run_with_id(id, Bounds::new(["081"], ["11"])).await });

    assert!(wait_for(Duration::from_secs(5), || fixture.source.total_fetch_calls() > 0).await);
    assert!(fixture.runner.cancel(&run_id));

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("cancelled run should settle well before the fetch delay")
        .unwrap()
        .unwrap();

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert_eq!(summary.outcome, OutcomeStatus::Cancelled);
    assert_eq!(summary.tally.cancelled, 10);
    assert_eq!(summary.tally.migrated, 0);
    assert!(fixture.target.is_empty());

    let calls_at_cancel = fixture.source.total_fetch_calls();
    assert!(calls_at_cancel <= 2);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.source.total_fetch_calls(), calls_at_cancel);

    let metrics = fixture.runner.host().metrics();
    assert!(metrics.peak_in_flight <= 2);
    assert!(metrics.activities_abandoned >= 1);
    assert!(!fixture.runner.host().is_running(&run_id));

    // A cancelled run is settled; asking again reattaches instead of resuming
    fixture.source.set_fetch_delay(None);
    let again = fixture
        .runner
        .run_with_id(run_id.clone(), Bounds::new(["081"], ["11"]))
        .await
        .unwrap();
    assert_eq!(again.status, RunStatus::Cancelled);
    assert_eq!(again.partitions, summary.partitions);
    assert_eq!(fixture.source.total_fetch_calls(), calls_at_cancel);
    assert!(fixture.target.is_empty());
}

#[tokio::test]
async fn test_cancel_lets_in_flight_work_finish_within_grace_period() {
    let fixture = cancellation_fixture(5_000, Duration::from_millis(100));
    let run_id = InstanceId::new("run-cancel-drain");

    let runner = fixture.runner.clone();
    let id = run_id.clone();
    let run = tokio::spawn(async move { runner.run_with_id(id, Bounds::new(["081"], ["11"])).await });

    assert!(wait_for(Duration::from_secs(5), || fixture.source.total_fetch_calls() > 0).await);
    assert!(fixture.runner.cancel(&run_id));

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("cancelled run should settle")
        .unwrap()
        .unwrap();

    assert_eq!(summary.status, RunStatus::Cancelled);
    let page = &summary.partitions[0].pages[0];
    let migrated = page
        .records
        .iter()
        .filter(|r| r.status == MigrationStatus::Migrated)
        .count();
    let cancelled = page
        .records
        .iter()
        .filter(|r| r.status == MigrationStatus::Cancelled)
        .count();

    assert!(migrated <= 2);
    assert_eq!(migrated + cancelled, 10);
    assert_eq!(fixture.target.len(), migrated);
    assert_eq!(fixture.source.total_fetch_calls(), migrated);
}

#[tokio::test]
async fn test_cancelling_an_unknown_run_is_a_no_op() {
    let fixture = MigrationFixture::new();
    assert!(!fixture.runner.cancel(&InstanceId::new("never-started")));
}
