//! Concurrent run tests
//!
//! Runs for different scope keys must not interfere; runs for the same key
//! serialize at commit and the last commit wins.

mod helpers;

use std::sync::Arc;

use helpers::{create_test_db, seed_two_groups, test_orchestrator};
use yseg_common::db::{RunStatus, ScopeKey};
use yseg_engine::db::{runs, segments};
use yseg_engine::models::RunRequest;
use yseg_engine::TracingAuditSink;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_municipality_and_barangay_runs_are_independent() {
    let (_dir, pool) = create_test_db().await;
    seed_two_groups(&pool, "BAR001", 12).await;
    seed_two_groups(&pool, "BAR002", 12).await;
    let orchestrator = Arc::new(test_orchestrator(&pool, Arc::new(TracingAuditSink)).await);

    let municipality = RunRequest::municipality("admin");
    let barangay = RunRequest::barangay("BAR002", "admin");
    let (municipal_outcome, barangay_outcome) = tokio::join!(
        orchestrator.execute_run(&municipality),
        orchestrator.execute_run(&barangay)
    );
    let municipal_outcome = municipal_outcome.unwrap();
    let barangay_outcome = barangay_outcome.unwrap();
    assert!(municipal_outcome.is_completed());
    assert!(barangay_outcome.is_completed());

    let municipal_total = municipal_outcome.completed().unwrap().metrics.total_responses;
    assert_eq!(municipal_total, 48);
    assert_eq!(barangay_outcome.completed().unwrap().metrics.total_responses, 24);

    let bar002_key = ScopeKey::barangay("BAR002", None);
    let bar002_active = segments::active_segments(&pool, &bar002_key).await.unwrap();
    assert!(bar002_active.iter().all(|s| s.run_id == barangay_outcome.run_id()));

    // Superseding the municipality key leaves BAR002 alone
    let rerun = orchestrator.execute_run(&municipality).await.unwrap();
    assert!(rerun.is_completed());

    let still_active = segments::active_segments(&pool, &bar002_key).await.unwrap();
    let before: Vec<_> = bar002_active.iter().map(|s| s.segment_id).collect();
    let after: Vec<_> = still_active.iter().map(|s| s.segment_id).collect();
    assert_eq!(before, after);

    let municipal_active = segments::active_segments(&pool, &ScopeKey::municipality(None))
        .await
        .unwrap();
    assert!(municipal_active.iter().all(|s| s.run_id == rerun.run_id()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_runs_last_commit_wins() {
    let (_dir, pool) = create_test_db().await;
    seed_two_groups(&pool, "BAR001", 12).await;
    let orchestrator = Arc::new(test_orchestrator(&pool, Arc::new(TracingAuditSink)).await);

    let request = RunRequest::barangay("BAR001", "admin");
    let (a, b) = tokio::join!(orchestrator.execute_run(&request), orchestrator.execute_run(&request));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.is_completed() && b.is_completed());

    for outcome in [&a, &b] {
        let run = runs::load_run(&pool, outcome.run_id()).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    // Exactly one run's segments are active
    let active = segments::active_segments(&pool, &ScopeKey::barangay("BAR001", None))
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
    let winner = active[0].run_id;
    assert!(active.iter().all(|s| s.run_id == winner));
    assert!(winner == a.run_id() || winner == b.run_id());
}
