#![allow(clippy::result_large_err)]
//! # Postwatch Core
//!
//! Runs a slow, unreliable external collector at most once at a time, keeps
//! its latest result set with locally cached images, and schedules the next
//! run at a randomized time.
//!
//! ## Architecture
//!
//! - **Collector**: contract for the external extraction, plus a command-backed implementation
//! - **Jobs**: single-flight `JobController`, run status, randomized `Scheduler`
//! - **Store**: transactional replace of the post set and the run history (SQLite)
//! - **Cache**: content-addressed image cache with orphan cleanup
//! - **API**: Axum HTTP interface
//! - **Observability**: structured logging and Prometheus metrics

pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod observability;
pub mod store;

pub use error::{ErrorCode, ErrorContext, ErrorSeverity, PostwatchError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CleanupReport, ImageCache, ImageKey};
    pub use crate::collector::{
        Collector, CollectorError, CommandCollector, PostList, PostPayload, PostValidator,
    };
    pub use crate::config::Config;
    pub use crate::db::{Database, HistoryEntry, HistoryStatus, StoredPost};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorSeverity, PostwatchError, Result};
    pub use crate::jobs::{
        compute_next_run, HttpTrigger, JobController, RunState, RunStatus, ScheduleWindow,
        Scheduler, SchedulerHandle, TriggerClient, TriggerError,
    };
    pub use crate::store::PostStore;
}
