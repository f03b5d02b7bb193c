//! Collection job orchestration.
//!
//! ```text
//! ┌─────────────┐  trigger()  ┌───────────────┐  collect()  ┌─────────────┐
//! │  Scheduler  │────────────▶│ JobController │────────────▶│  Collector  │
//! │ (HTTP / in- │             │ (single-flight│             └─────────────┘
//! │  process)   │             │  RunStatus)   │  replace()  ┌─────────────┐
//! └─────────────┘             └───────────────┘────────────▶│  PostStore  │
//!                                                           └─────────────┘
//! ```

pub mod controller;
pub mod scheduler;
pub mod status;
pub mod trigger;

pub use controller::JobController;
pub use scheduler::{compute_next_run, ScheduleWindow, Scheduler, SchedulerHandle};
pub use status::{RunState, RunStatus};
pub use trigger::{HttpTrigger, TriggerClient, TriggerError};
