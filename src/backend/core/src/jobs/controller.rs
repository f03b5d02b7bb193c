//! Single-flight controller for the collection job.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use super::status::RunStatus;
use crate::collector::{Collector, PostList};
use crate::db::HistoryStatus;
use crate::error::{PostwatchError, Result};
use crate::observability::{metrics, RunEvent};
use crate::store::PostStore;

/// Owns the run status and runs at most one collection at a time.
///
/// A trigger while a run is in flight is rejected, never queued. The run
/// itself executes on a tracked background task so status reads are never
/// delayed by it.
pub struct JobController {
    status: Mutex<RunStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
    collector: Arc<dyn Collector>,
    store: PostStore,
}

impl JobController {
    pub fn new(collector: Arc<dyn Collector>, store: PostStore) -> Self {
        Self {
            status: Mutex::new(RunStatus::idle()),
            task: Mutex::new(None),
            collector,
            store,
        }
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    /// Consistent snapshot of the current status.
    pub fn status(&self) -> RunStatus {
        self.status.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.lock().is_running()
    }

    /// Start a run unless one is already in flight.
    ///
    /// Returns the freshly `running` status without waiting for the run.
    pub fn trigger(self: &Arc<Self>) -> Result<RunStatus> {
        // Lock order is status, then task. The handle is stored before the
        // status lock is released so `wait` always sees the latest run.
        let snapshot = {
            let mut status = self.status.lock();
            if status.is_running() {
                metrics::record_trigger_rejected();
                RunEvent::Rejected.log();
                return Err(PostwatchError::run_in_progress(status.clone()));
            }
            status.start();

            let mut task = self.task.lock();
            let this = Arc::clone(self);
            *task = Some(tokio::spawn(async move { this.run().await }));
            status.clone()
        };

        RunEvent::Triggered.log();
        Ok(snapshot)
    }

    /// Wait for the tracked run, if any, to finish.
    ///
    /// A task that died outside the run's own panic guard still leaves the
    /// status in `error`.
    pub async fn wait(&self) {
        let handle = self.task.lock().take();
        let Some(handle) = handle else {
            return;
        };

        if let Err(e) = handle.await {
            let error = PostwatchError::run_aborted(e.to_string());
            error.log();
            let mut status = self.status.lock();
            if status.is_running() {
                status.fail(error.describe());
            }
        }
    }

    #[instrument(skip(self), name = "collection_run")]
    async fn run(self: Arc<Self>) {
        let started = Instant::now();

        if let Err(e) = self.store.log_history(HistoryStatus::Started, None).await {
            warn!(error = %e, "Failed to record run start");
        }

        let outcome = match AssertUnwindSafe(self.execute()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(PostwatchError::run_aborted(panic_message(panic.as_ref()))),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(list) => {
                let posts = list.len();
                self.status.lock().complete(list);
                metrics::record_run("completed");
                RunEvent::Completed { posts, duration_ms }.log();
            }
            Err(error) => {
                let message = error.describe();
                if let Err(e) = self
                    .store
                    .log_history(HistoryStatus::Error, Some(&message))
                    .await
                {
                    e.log();
                }
                self.status.lock().fail(message.clone());
                metrics::record_run("error");
                RunEvent::Failed {
                    error: message,
                    duration_ms,
                }
                .log();
            }
        }
    }

    /// Collect, persist, and record completion. Only a durably stored result
    /// counts as success.
    async fn execute(&self) -> Result<PostList> {
        let list = self.collector.collect().await?;
        self.store.replace(&list.posts).await?;
        self.store
            .log_history(HistoryStatus::Completed, None)
            .await?;
        Ok(list)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
