//! Manual trigger command.

use anyhow::Result;
use clap::Args;
use postwatch_core::{api::handlers::TriggerResponse, jobs::RunStatus};
use std::time::Duration;

use super::status::print_status;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct TriggerArgs {
    /// Poll `/status` until the run leaves the running state
    #[arg(short, long)]
    wait: bool,

    /// Seconds between polls when waiting
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    poll_secs: u64,
}

pub async fn execute(args: TriggerArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: TriggerResponse = client.post("/trigger-scrape").await?;

    if !args.wait {
        match format {
            OutputFormat::Table => {
                output::print_success(&response.message);
                print_status(&response.status);
            }
            _ => output::print_item(&response, format)?,
        }
        return Ok(());
    }

    if format == OutputFormat::Table {
        output::print_success(&response.message);
        output::print_info("Waiting for the run to finish...");
    }

    let mut interval = tokio::time::interval(Duration::from_secs(args.poll_secs));
    let status = loop {
        interval.tick().await;
        let status: RunStatus = client.get("/status").await?;
        if !status.is_running() {
            break status;
        }
    };

    match format {
        OutputFormat::Table => print_status(&status),
        _ => output::print_item(&status, format)?,
    }

    if let Some(message) = &status.error_message {
        anyhow::bail!("Run failed: {}", message);
    }

    Ok(())
}
