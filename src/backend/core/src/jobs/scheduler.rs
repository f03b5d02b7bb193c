//! Randomized periodic triggering.
//!
//! Every iteration rolls a new target: `interval_days` from now, at a uniformly
//! random time of day inside `[start_hour, end_hour)`. A failed trigger
//! (including a conflict with a run in flight) is followed by a cooldown
//! before the next roll.

use chrono::{DateTime, Local, TimeZone};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::trigger::TriggerClient;
use crate::config::SchedulerConfig;
use crate::error::{PostwatchError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Schedule Window
// ═══════════════════════════════════════════════════════════════════════════════

/// When runs may happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    interval_days: u32,
    start_hour: u32,
    end_hour: u32,
}

impl ScheduleWindow {
    pub fn new(interval_days: u32, start_hour: u32, end_hour: u32) -> Result<Self> {
        if end_hour > 24 || start_hour >= end_hour {
            return Err(PostwatchError::configuration(format!(
                "invalid schedule window {}..{}",
                start_hour, end_hour
            )));
        }
        Ok(Self {
            interval_days,
            start_hour,
            end_hour,
        })
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        Self::new(config.interval_days, config.start_hour, config.end_hour)
    }

    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }
}

/// The next trigger time after `now`.
///
/// The date is `now + interval_days`; the time of day is drawn uniformly from
/// the window. If that local time does not exist (DST gap) the plain
/// `now + interval_days` is used.
pub fn compute_next_run<Tz, R>(now: &DateTime<Tz>, window: &ScheduleWindow, rng: &mut R) -> DateTime<Tz>
where
    Tz: TimeZone,
    R: Rng,
{
    let base = now.clone() + chrono::Duration::days(i64::from(window.interval_days));

    let hour = rng.random_range(window.start_hour..window.end_hour);
    let minute = rng.random_range(0..60);
    let second = rng.random_range(0..60);

    base.date_naive()
        .and_hms_opt(hour, minute, second)
        .and_then(|naive| now.timezone().from_local_datetime(&naive).earliest())
        .unwrap_or(base)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scheduler
// ═══════════════════════════════════════════════════════════════════════════════

/// Autonomous loop calling a [`TriggerClient`] at randomized times.
pub struct Scheduler<T> {
    trigger: T,
    window: ScheduleWindow,
    cooldown: Duration,
    rng: StdRng,
}

impl<T: TriggerClient + 'static> Scheduler<T> {
    pub fn new(trigger: T, window: ScheduleWindow, cooldown: Duration) -> Self {
        Self {
            trigger,
            window,
            cooldown,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn from_config(trigger: T, config: &SchedulerConfig) -> Result<Self> {
        Ok(Self::new(
            trigger,
            ScheduleWindow::from_config(config)?,
            Duration::from_secs(config.cooldown_secs),
        ))
    }

    /// Use a fixed random source (tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Spawn the loop, returning a handle for shutdown.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_days = self.window.interval_days,
            start_hour = self.window.start_hour,
            end_hour = self.window.end_hour,
            "Scheduler started"
        );

        loop {
            let now = Local::now();
            let next = compute_next_run(&now, &self.window, &mut self.rng);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next.format("%Y-%m-%d %H:%M:%S"), "Next run scheduled");

            if !sleep_unless_shutdown(wait, &mut shutdown).await {
                break;
            }

            match self.trigger.trigger().await {
                Ok(()) => info!("Run triggered"),
                Err(e) => {
                    warn!(
                        error = %e,
                        cooldown_secs = self.cooldown.as_secs(),
                        "Trigger failed, cooling down"
                    );
                    if !sleep_unless_shutdown(self.cooldown, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

/// Sleep for `duration`; `false` if shutdown was requested first.
async fn sleep_unless_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }

    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal and wait for the loop to exit.
    pub async fn stop(self) {
        self.shutdown();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
