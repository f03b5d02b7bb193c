//! Health check command.
//!
//! Queries the `/health` endpoint and displays server and database status.

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get("/health").await?;

    match format {
        OutputFormat::Table => {
            let field = |name: &str| {
                health
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string()
            };
            let status = field("status");

            output::print_header("Server Health");
            output::print_detail("Status", &status);
            output::print_detail("API URL", client.base_url());
            output::print_detail("Version", &field("version"));
            output::print_detail("Database", &field("database"));
            output::print_detail("Timestamp", &field("timestamp"));

            if status == "healthy" {
                output::print_success("All systems operational");
            } else {
                output::print_warning(&format!("Server status: {}", status));
            }
        }
        _ => output::print_item(&health, format)?,
    }

    Ok(())
}
