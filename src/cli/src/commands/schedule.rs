//! Standalone scheduler command.
//!
//! Runs the randomized scheduler against a remote server, calling
//! `POST /trigger-scrape` at each scheduled time until interrupted.

use anyhow::{Context, Result};
use clap::Args;
use postwatch_core::{
    config::SchedulerConfig,
    jobs::{HttpTrigger, Scheduler},
};

use crate::output;

#[derive(Args)]
pub struct ScheduleArgs {
    /// Days between runs
    #[arg(long)]
    interval_days: Option<u32>,

    /// First hour (inclusive) of the run window
    #[arg(long)]
    start_hour: Option<u32>,

    /// Last hour (exclusive) of the run window
    #[arg(long)]
    end_hour: Option<u32>,

    /// Seconds to pause after a failed trigger
    #[arg(long)]
    cooldown_secs: Option<u64>,
}

impl ScheduleArgs {
    /// Overlay the flags on the scheduler defaults.
    fn into_config(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            enabled: true,
            interval_days: self.interval_days.unwrap_or(defaults.interval_days),
            start_hour: self.start_hour.unwrap_or(defaults.start_hour),
            end_hour: self.end_hour.unwrap_or(defaults.end_hour),
            cooldown_secs: self.cooldown_secs.unwrap_or(defaults.cooldown_secs),
        }
    }
}

pub async fn execute(args: ScheduleArgs, api_url: &str) -> Result<()> {
    let config = args.into_config();
    let trigger = HttpTrigger::new(api_url).context("Failed to create trigger client")?;
    let endpoint = trigger.endpoint().to_string();

    let scheduler = Scheduler::from_config(trigger, &config)?;

    output::print_info(&format!(
        "Scheduling runs every {} day(s) between {:02}:00 and {:02}:00 via {}",
        config.interval_days, config.start_hour, config.end_hour, endpoint
    ));
    output::print_info(&format!(
        "Cooldown after failures: {}s. Press Ctrl+C to stop.",
        config.cooldown_secs
    ));

    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    handle.stop().await;
    output::print_success("Scheduler stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_overlay_defaults() {
        let args = ScheduleArgs {
            interval_days: Some(1),
            start_hour: None,
            end_hour: Some(12),
            cooldown_secs: None,
        };

        let config = args.into_config();
        let defaults = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval_days, 1);
        assert_eq!(config.start_hour, defaults.start_hour);
        assert_eq!(config.end_hour, 12);
        assert_eq!(config.cooldown_secs, defaults.cooldown_secs);
    }
}
