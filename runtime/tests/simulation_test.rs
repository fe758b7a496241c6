//! Integration tests for the simulation controller
//!
//! Every test drives real workers on real timers, so rates are kept short and
//! every wait is bounded by a timeout.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use ticket_sim_core::{ConfigurationId, PoolSnapshot, RunState, SimulationError};
use ticket_sim_runtime::{SimulationController, SimulatorConfig};
use ticket_sim_testing::{
    ConfigurationBuilder, assert_snapshot_invariants, init_test_tracing, test_clock,
};

// ============================================================================
// Test Fixtures
// ============================================================================

const WAIT: Duration = Duration::from_secs(10);

fn controller() -> SimulationController {
    init_test_tracing();
    SimulationController::new(SimulatorConfig::default())
}

/// A run that will not finish on its own within any test
fn long_running(id: u64) -> ConfigurationBuilder {
    ConfigurationBuilder::new(id)
        .with_total_tickets(10_000)
        .with_capacity(5)
        .with_release_rate(Duration::from_millis(20))
        .with_retrieval_rate(Duration::from_millis(30))
}

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn test_run_drains_lifetime_cap() {
    let controller = controller();
    let builder = ConfigurationBuilder::new(1)
        .with_total_tickets(10)
        .with_capacity(3)
        .with_release_rate(Duration::from_millis(100))
        .with_retrieval_rate(Duration::from_millis(150))
        .with_workers(1, 1);

    let mut run = controller.start(builder.request()).unwrap();
    let state = tokio::time::timeout(WAIT, run.wait())
        .await
        .expect("run should complete");

    assert_eq!(state, RunState::Completed);
    let status = controller.status(ConfigurationId::new(1)).unwrap();
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(
        status.snapshot,
        PoolSnapshot {
            current: 0,
            released: 10,
            retrieved: 10,
        }
    );
    assert!(status.finished_at.is_some());
    assert_eq!(controller.active_runs(), 0);
}

#[tokio::test]
async fn test_capacity_above_total_never_fills() {
    let controller = controller();
    let builder = ConfigurationBuilder::new(2)
        .with_total_tickets(4)
        .with_capacity(50)
        .with_release_rate(Duration::from_millis(5))
        .with_retrieval_rate(Duration::from_millis(20));

    let mut run = controller.start(builder.request()).unwrap();
    assert_eq!(tokio::time::timeout(WAIT, run.wait()).await.unwrap(), RunState::Completed);

    let snapshot = run.snapshot();
    assert_eq!(snapshot.released, 4);
    assert_eq!(snapshot.retrieved, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_pool_respects_capacity() {
    let controller = controller();
    let builder = ConfigurationBuilder::new(3)
        .with_total_tickets(100)
        .with_capacity(1)
        .with_release_rate(Duration::from_millis(2))
        .with_retrieval_rate(Duration::from_millis(2))
        .with_workers(5, 5);
    let config = builder.build();

    let mut run = controller.start(builder.request()).unwrap();

    let mut snapshots = run.subscribe();
    let watched = config.clone();
    let watcher = tokio::spawn(async move {
        let mut observed = 0u32;
        while snapshots.changed().await.is_ok() {
            let snapshot = *snapshots.borrow_and_update();
            assert!(snapshot.current <= 1, "pool over capacity: {snapshot:?}");
            assert_snapshot_invariants(&snapshot, &watched);
            observed += 1;
        }
        observed
    });

    assert_eq!(tokio::time::timeout(WAIT, run.wait()).await.unwrap(), RunState::Completed);
    let observed = tokio::time::timeout(WAIT, watcher).await.unwrap().unwrap();
    assert!(observed > 0);

    let status = controller.status(config.id).unwrap();
    assert_snapshot_invariants(&status.snapshot, &config);
    assert_eq!(status.snapshot.released, 100);
    assert_eq!(status.snapshot.retrieved, 100);
}

// ============================================================================
// Stopping
// ============================================================================

#[tokio::test]
async fn test_stop_immediately_after_start() {
    let controller = controller();
    let builder = long_running(10).with_workers(2, 2);
    let config = builder.build();

    controller.start(builder.request()).unwrap();
    let status = tokio::time::timeout(WAIT, controller.stop(config.id))
        .await
        .expect("stop should return promptly")
        .expect("run should be known");

    assert_eq!(status.state, RunState::Stopped);
    assert!(status.snapshot.released - status.snapshot.retrieved <= config.max_ticket_capacity);
    assert_snapshot_invariants(&status.snapshot, &config);
    assert!(status.finished_at.is_some());
}

#[tokio::test]
async fn test_snapshot_is_frozen_after_stop() {
    let controller = controller();
    let builder = long_running(11);

    let run = controller.start(builder.request()).unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let stopped = controller.stop(run.id()).await.unwrap();
    assert!(stopped.snapshot.released > 0);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let later = controller.status(run.id()).unwrap();
    assert_eq!(later.snapshot, stopped.snapshot);
    assert_eq!(later.state, RunState::Stopped);
    assert_eq!(run.state(), RunState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_timeout_aborts_and_drains_workers() {
    init_test_tracing();
    let controller =
        SimulationController::new(SimulatorConfig::default().with_stop_timeout(Duration::ZERO));
    let builder = ConfigurationBuilder::new(15)
        .with_total_tickets(1_000_000)
        .with_capacity(4)
        .with_release_rate(Duration::from_millis(1))
        .with_retrieval_rate(Duration::from_millis(1))
        .with_workers(8, 8);
    let config = builder.build();

    let run = controller.start(builder.request()).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let stopped = tokio::time::timeout(WAIT, controller.stop(config.id))
        .await
        .expect("stop should return promptly")
        .unwrap();
    assert_eq!(stopped.state, RunState::Stopped);
    assert_snapshot_invariants(&stopped.snapshot, &config);

    // Every worker dropped its pool reference, closing the snapshot channel
    assert!(run.subscribe().has_changed().is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.status(config.id).unwrap().snapshot, stopped.snapshot);
    assert_eq!(controller.active_runs(), 0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let controller = controller();
    let builder = long_running(12);
    let id = builder.build().id;

    controller.start(builder.request()).unwrap();
    let first = controller.stop(id).await.unwrap();
    let second = controller.stop(id).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_stops_agree() {
    let controller = Arc::new(controller());
    let builder = long_running(13).with_workers(3, 3);
    let id = builder.build().id;
    controller.start(builder.request()).unwrap();

    let (a, b) = tokio::join!(controller.stop(id), controller.stop(id));

    assert_eq!(a.unwrap().state, RunState::Stopped);
    assert_eq!(b.unwrap().state, RunState::Stopped);
}

#[tokio::test]
async fn test_stop_after_completion_keeps_completed() {
    let controller = controller();
    let builder = ConfigurationBuilder::new(14).with_total_tickets(3);

    let mut run = controller.start(builder.request()).unwrap();
    tokio::time::timeout(WAIT, run.wait()).await.unwrap();

    let status = controller.stop(run.id()).await.unwrap();
    assert_eq!(status.state, RunState::Completed);
}

// ============================================================================
// Start rules
// ============================================================================

#[tokio::test]
async fn test_double_start_is_rejected() {
    let controller = controller();
    let builder = long_running(20);
    let id = builder.build().id;

    let first = controller.start(builder.request()).unwrap();
    let second = controller.start(builder.request());

    assert_eq!(second.unwrap_err(), SimulationError::AlreadyRunning(id));
    assert_eq!(first.state(), RunState::Running);
    assert_eq!(controller.status(id).unwrap().state, RunState::Running);
    assert_eq!(controller.active_runs(), 1);

    controller.stop(id).await.unwrap();
}

#[tokio::test]
async fn test_invalid_configurations_are_rejected() {
    let controller = controller();

    let zero_total = ConfigurationBuilder::new(21).with_total_tickets(0).request();
    let zero_capacity = ConfigurationBuilder::new(22).with_capacity(0).request();
    let zero_rate = ConfigurationBuilder::new(23)
        .with_release_rate(Duration::ZERO)
        .request();
    let no_customers = ConfigurationBuilder::new(24).with_workers(1, 0).request();

    for request in [zero_total, zero_capacity, zero_rate, no_customers] {
        assert!(matches!(
            controller.start(request),
            Err(SimulationError::InvalidConfiguration(_))
        ));
    }
    assert!(controller.run_ids().is_empty());
}

#[tokio::test]
async fn test_restart_after_terminal_run() {
    let controller = controller();
    let builder = ConfigurationBuilder::new(25).with_total_tickets(3);

    let mut first = controller.start(builder.request()).unwrap();
    tokio::time::timeout(WAIT, first.wait()).await.unwrap();

    let mut second = controller.start(builder.request()).unwrap();
    assert_eq!(tokio::time::timeout(WAIT, second.wait()).await.unwrap(), RunState::Completed);

    // Fresh pool, not accumulated across runs
    let status = controller.status(second.id()).unwrap();
    assert_eq!(status.snapshot.released, 3);
    assert_eq!(controller.run_ids(), vec![ConfigurationId::new(25)]);
}

#[tokio::test]
async fn test_independent_runs_do_not_interfere() {
    let controller = controller();
    let short = ConfigurationBuilder::new(26).with_total_tickets(3);
    let long = long_running(27);

    let mut short_run = controller.start(short.request()).unwrap();
    controller.start(long.request()).unwrap();

    tokio::time::timeout(WAIT, short_run.wait()).await.unwrap();
    assert_eq!(controller.status(ConfigurationId::new(27)).unwrap().state, RunState::Running);

    let stopped = controller.stop(ConfigurationId::new(27)).await.unwrap();
    assert_eq!(stopped.state, RunState::Stopped);
    assert_eq!(
        controller.status(ConfigurationId::new(26)).unwrap().state,
        RunState::Completed
    );
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_unknown_run_queries() {
    let controller = controller();
    let id = ConfigurationId::new(99);

    assert_eq!(controller.status(id), Err(SimulationError::UnknownRun(id)));
    assert!(controller.stop(id).await.is_none());
    assert!(controller.subscribe(id).is_none());
}

#[tokio::test]
async fn test_status_does_not_block_while_running() {
    let controller = controller();
    let builder = long_running(30);
    let id = builder.build().id;
    controller.start(builder.request()).unwrap();

    let status = controller.status(id).unwrap();
    assert_eq!(status.state, RunState::Running);
    assert!(status.finished_at.is_none());

    controller.stop(id).await.unwrap();
}

#[tokio::test]
async fn test_timestamps_come_from_injected_clock() {
    init_test_tracing();
    let clock = test_clock();
    let expected = ticket_sim_core::environment::Clock::now(&clock);
    let controller = SimulationController::with_clock(SimulatorConfig::default(), Arc::new(clock));

    let builder = long_running(31);
    controller.start(builder.request()).unwrap();
    let status = controller.stop(builder.build().id).await.unwrap();

    assert_eq!(status.started_at, expected);
    assert_eq!(status.finished_at, Some(expected));
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_stops_every_running_run() {
    let controller = controller();
    for id in 40..43 {
        controller.start(long_running(id).request()).unwrap();
    }
    let mut done = controller
        .start(ConfigurationBuilder::new(43).with_total_tickets(2).request())
        .unwrap();
    tokio::time::timeout(WAIT, done.wait()).await.unwrap();

    let stopped = tokio::time::timeout(WAIT, controller.shutdown()).await.unwrap();

    assert_eq!(stopped.len(), 3);
    assert!(stopped.iter().all(|s| s.state == RunState::Stopped));
    assert_eq!(controller.active_runs(), 0);
    assert_eq!(controller.run_ids().len(), 4);
    assert_eq!(
        controller.status(ConfigurationId::new(43)).unwrap().state,
        RunState::Completed
    );
}
