//! Contract Test: Scheduling, Failure Containment & Shutdown
//!
//! Constraints verified:
//! - The first cycle runs immediately at startup
//! - A failed cycle does not prevent the next one from running
//! - The scheduler terminates promptly once shutdown resolves
//!
//! If this test fails, someone has let a cycle error escape the loop or
//! made the wait between ticks ignore shutdown.

mod common;

use cfddns_core::{CycleResult, CycleStep, Error, Reconciler, Scheduler};
use common::*;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(20);

#[tokio::test]
async fn failed_cycle_does_not_stop_the_next_one() {
    let provider = MockDnsProvider::with_published("203.0.113.45");
    let ip_source = ScriptedIpSource::new(vec![
        Err(Error::network("connection reset by peer")),
        Ok("203.0.113.99".parse().unwrap()),
    ]);
    let reconciler = Reconciler::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        &settings(),
    )
    .unwrap();

    let (scheduler, mut reports) = Scheduler::with_reports(TICK, 16);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let run = scheduler.run(&reconciler, async {
        let _ = shutdown_rx.await;
    });

    let observe = async {
        let first = reports.recv().await.expect("first report");
        let second = reports.recv().await.expect("second report");
        shutdown_tx.send(()).unwrap();
        (first, second)
    };

    let (summary, (first, second)) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(run, observe)
    })
    .await
    .expect("scheduler should stop within 5 seconds");

    assert_eq!(first.cycle, 1);
    assert_eq!(
        first.result,
        CycleResult::Failed {
            step: CycleStep::ResolveIp,
            error: Error::network("connection reset by peer"),
        }
    );

    assert_eq!(second.cycle, 2);
    assert_eq!(
        second.result,
        CycleResult::Updated {
            old_ip: "203.0.113.45".to_string(),
            new_ip: "203.0.113.99".to_string(),
        }
    );

    assert!(summary.cycles >= 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.updated >= 1);
    assert_eq!(provider.update_calls(), 1);
}

#[tokio::test]
async fn first_cycle_runs_at_startup() {
    let provider = MockDnsProvider::with_published("203.0.113.45");
    let ip_source = ScriptedIpSource::fixed("203.0.113.45");
    let reconciler = Reconciler::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        &settings(),
    )
    .unwrap();

    // An hour-long interval: only the startup cycle can run in this test
    let (scheduler, mut reports) = Scheduler::with_reports(Duration::from_secs(3600), 4);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let run = scheduler.run(&reconciler, async {
        let _ = shutdown_rx.await;
    });

    let observe = async {
        let report = reports.recv().await.expect("startup report");
        shutdown_tx.send(()).unwrap();
        report
    };

    let (summary, report) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(run, observe)
    })
    .await
    .expect("scheduler should stop within 5 seconds");

    assert_eq!(report.cycle, 1);
    assert!(matches!(report.result, CycleResult::NoChangeNeeded { .. }));
    assert_eq!(summary.cycles, 1);
    assert_eq!(ip_source.call_count(), 1);
}

#[tokio::test]
async fn shutdown_ends_the_wait_between_ticks() {
    let provider = MockDnsProvider::with_published("203.0.113.45");
    let reconciler = Reconciler::new(
        Box::new(ScriptedIpSource::fixed("203.0.113.45")),
        Box::new(provider),
        &settings(),
    )
    .unwrap();

    let scheduler = Scheduler::new(Duration::from_secs(3600));

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(&reconciler, tokio::time::sleep(Duration::from_millis(50))),
    )
    .await
    .expect("shutdown must not wait for the next tick");

    assert_eq!(summary.cycles, 1);
}

#[tokio::test]
async fn run_once_reports_single_cycle() {
    let provider = MockDnsProvider::new();
    let reconciler = Reconciler::new(
        Box::new(ScriptedIpSource::fixed("203.0.113.45")),
        Box::new(provider),
        &settings(),
    )
    .unwrap();

    let (scheduler, mut reports) = Scheduler::with_reports(TICK, 4);
    let result = scheduler.run_once(&reconciler).await;

    assert!(result.is_failed());
    let report = reports.try_recv().expect("report emitted");
    assert_eq!(report.cycle, 1);
    assert_eq!(report.result, result);
}

#[tokio::test]
async fn dropped_report_receiver_does_not_stop_cycles() {
    let provider = MockDnsProvider::with_published("203.0.113.45");
    let reconciler = Reconciler::new(
        Box::new(ScriptedIpSource::fixed("203.0.113.45")),
        Box::new(provider.clone()),
        &settings(),
    )
    .unwrap();

    let (scheduler, reports) = Scheduler::with_reports(TICK, 1);
    drop(reports);

    let summary = scheduler
        .run(&reconciler, tokio::time::sleep(TICK * 5))
        .await;

    assert!(summary.cycles >= 2, "got {} cycles", summary.cycles);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn zero_interval_runs_instead_of_panicking() {
    let provider = MockDnsProvider::with_published("203.0.113.45");
    let reconciler = Reconciler::new(
        Box::new(ScriptedIpSource::fixed("203.0.113.45")),
        Box::new(provider),
        &settings(),
    )
    .unwrap();

    let scheduler = Scheduler::new(Duration::ZERO);

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(&reconciler, tokio::time::sleep(TICK)),
    )
    .await
    .expect("scheduler should stop within 5 seconds");

    assert!(summary.cycles >= 1);
    assert_eq!(summary.failed, 0);
}
