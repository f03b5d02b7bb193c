//! Postwatch CLI - inspect, trigger and schedule collection runs.
//!
//! Talks to a running `postwatch-server` over its HTTP API.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{config, health, history, posts, schedule, status, trigger};
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Postwatch - single-flight collection runner CLI
#[derive(Parser)]
#[command(
    name = "postwatch",
    version,
    about = "Postwatch - single-flight collection runner",
    long_about = "CLI tool for triggering collection runs, browsing stored posts and run history, and scheduling runs against a Postwatch server.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "POSTWATCH_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current run status
    Status,

    /// Start a collection run
    Trigger(trigger::TriggerArgs),

    /// List stored posts
    Posts(posts::PostsArgs),

    /// List run history
    History(history::HistoryArgs),

    /// Check server health
    Health,

    /// Trigger runs on a randomized schedule until interrupted
    Schedule(schedule::ScheduleArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

fn init_logging(command: &Commands) {
    let default_level = match command {
        Commands::Schedule(_) => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_logging(&cli.command);

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Status => status::execute(&client, format).await,
        Commands::Trigger(args) => trigger::execute(args, &client, format).await,
        Commands::Posts(args) => posts::execute(args, &client, format).await,
        Commands::History(args) => history::execute(args, &client, format).await,
        Commands::Health => health::execute(&client, format).await,
        Commands::Schedule(args) => schedule::execute(args, client.base_url()).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
