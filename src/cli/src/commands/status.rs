//! Run status command.

use anyhow::Result;
use colored::*;
use postwatch_core::jobs::{RunState, RunStatus};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

fn colorize(state: RunState) -> ColoredString {
    match state {
        RunState::Idle => state.as_str().dimmed(),
        RunState::Running => state.as_str().yellow().bold(),
        RunState::Completed => state.as_str().green().bold(),
        RunState::Error => state.as_str().red().bold(),
    }
}

/// Print a run status in table form.
pub fn print_status(status: &RunStatus) {
    output::print_header("Run Status");
    output::print_detail("Status", &colorize(status.status).to_string());
    output::print_detail(
        "Since",
        &status.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    if let Some(result) = &status.last_result {
        output::print_detail("Posts collected", &result.len().to_string());
    }
    if let Some(message) = &status.error_message {
        output::print_detail("Error", message);
    }
}

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: RunStatus = client.get("/status").await?;

    match format {
        OutputFormat::Table => print_status(&status),
        _ => output::print_item(&status, format)?,
    }

    Ok(())
}
