//! Run history command.

use anyhow::Result;
use clap::Args;
use postwatch_core::api::handlers::HistoryResponse;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HistoryArgs {
    /// Maximum number of entries to show
    #[arg(short, long, default_value_t = 10)]
    limit: i64,
}

#[derive(Tabled, Serialize)]
struct HistoryRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Error")]
    error: String,
}

pub async fn execute(args: HistoryArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: HistoryResponse = client
        .get(&format!("/history?limit={}", args.limit))
        .await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<HistoryRow> = response
                .history
                .iter()
                .map(|entry| HistoryRow {
                    id: entry.id,
                    timestamp: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    status: entry.status.to_string(),
                    error: entry
                        .error_message
                        .as_deref()
                        .map(|m| output::truncate(m, 60))
                        .unwrap_or_default(),
                })
                .collect();
            output::print_list(&rows, format)?;
        }
        _ => output::print_item(&response.history, format)?,
    }

    Ok(())
}
