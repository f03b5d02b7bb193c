//! Tests for the randomized scheduler loop.
//!
//! Time is paused, so days of scheduled waiting pass instantly.

mod common;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use common::{posts, test_controller, Outcome, ScriptedCollector, DEAD_IMAGE_HOST};
use postwatch_core::jobs::{ScheduleWindow, Scheduler, TriggerClient, TriggerError};

// ============================================================================
// Stub Trigger
// ============================================================================

/// Records call times and replays scripted results (then succeeds).
#[derive(Clone)]
struct StubTrigger {
    results: Arc<Mutex<VecDeque<Result<(), TriggerError>>>>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl StubTrigger {
    fn with_results(results: Vec<Result<(), TriggerError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<Instant> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TriggerClient for StubTrigger {
    async fn trigger(&self) -> Result<(), TriggerError> {
        self.calls.lock().push(Instant::now());
        self.results.lock().pop_front().unwrap_or(Ok(()))
    }
}

// Longer than any scheduled gap, so a skipped cooldown is visible.
const COOLDOWN: Duration = Duration::from_secs(3 * 24 * 3600);
const TWO_DAYS: Duration = Duration::from_secs(2 * 24 * 3600);

fn scheduler(stub: &StubTrigger) -> Scheduler<StubTrigger> {
    Scheduler::new(
        stub.clone(),
        ScheduleWindow::new(1, 0, 24).unwrap(),
        COOLDOWN,
    )
    .with_rng(StdRng::seed_from_u64(11))
}

async fn wait_for_calls(stub: &StubTrigger, n: usize) {
    while stub.calls().len() < n {
        tokio::time::sleep(Duration::from_secs(600)).await;
    }
}

// ============================================================================
// Loop Behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_triggers_repeatedly_within_interval() {
    let stub = StubTrigger::with_results(vec![]);
    let started = Instant::now();
    let handle = scheduler(&stub).start();

    wait_for_calls(&stub, 3).await;
    handle.stop().await;

    let calls = stub.calls();
    assert!(calls.len() >= 3);
    // Each wait targets tomorrow inside the window: strictly less than two days.
    let mut previous = started;
    for call in calls.iter().take(3) {
        let gap = call.duration_since(previous);
        assert!(gap > Duration::ZERO);
        assert!(gap < TWO_DAYS);
        previous = *call;
    }
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_followed_by_cooldown() {
    let stub = StubTrigger::with_results(vec![
        Err(TriggerError::Conflict),
        Err(TriggerError::Status(503)),
    ]);
    let handle = scheduler(&stub).start();

    wait_for_calls(&stub, 4).await;
    handle.stop().await;

    let calls = stub.calls();
    assert!(calls[1].duration_since(calls[0]) >= COOLDOWN);
    assert!(calls[2].duration_since(calls[1]) >= COOLDOWN);
    // The third trigger succeeds: back to the plain schedule.
    assert!(calls[3].duration_since(calls[2]) < TWO_DAYS);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_sleep() {
    let stub = StubTrigger::with_results(vec![]);
    let handle = scheduler(&stub).start();

    tokio::task::yield_now().await;
    handle.stop().await;

    assert!(stub.calls().is_empty());
}

// ============================================================================
// In-Process Trigger
// ============================================================================

#[tokio::test]
async fn test_in_process_trigger_reports_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let collector = ScriptedCollector::gated(Outcome::Posts(posts(1, DEAD_IMAGE_HOST)));
    let controller = test_controller(collector.clone(), dir.path()).await;

    assert_eq!(TriggerClient::trigger(&controller).await, Ok(()));
    assert_eq!(
        TriggerClient::trigger(&controller).await,
        Err(TriggerError::Conflict)
    );

    collector.release();
    controller.wait().await;
}
