//! Observability: structured logging and Prometheus metrics.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize the logging stack.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Install the global Prometheus recorder and describe all metrics.
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    self::metrics::register_metrics();
    tracing::info!("Metrics recorder installed");
    Ok(handle)
}

/// Metric names and recording helpers.
pub mod metrics {
    use metrics::{counter, describe_counter, describe_gauge, gauge};

    /// Register all metric descriptions.
    pub fn register_metrics() {
        describe_counter!(
            "postwatch_runs_total",
            "Collection runs finished, by outcome"
        );
        describe_counter!(
            "postwatch_triggers_rejected_total",
            "Triggers rejected because a run was in flight"
        );
        describe_counter!(
            "postwatch_images_total",
            "Image materializations, by result"
        );
        describe_counter!(
            "postwatch_orphans_removed_total",
            "Cached images removed because no post references them"
        );
        describe_counter!(
            "postwatch_errors_total",
            "Errors raised, by code and category"
        );

        describe_gauge!(
            "postwatch_posts_current",
            "Posts in the current result set"
        );
    }

    /// Record a finished run; `outcome` is `completed` or `error`.
    pub fn record_run(outcome: &'static str) {
        counter!("postwatch_runs_total", "outcome" => outcome).increment(1);
    }

    pub fn record_trigger_rejected() {
        counter!("postwatch_triggers_rejected_total").increment(1);
    }

    /// `result` is one of `cached`, `downloaded`, `failed`.
    pub fn record_image(result: &'static str) {
        counter!("postwatch_images_total", "result" => result).increment(1);
    }

    pub fn record_orphans_removed(count: usize) {
        counter!("postwatch_orphans_removed_total").increment(count as u64);
    }

    pub fn set_current_posts(count: usize) {
        gauge!("postwatch_posts_current").set(count as f64);
    }
}

/// Structured run lifecycle events.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "event_type")]
pub enum RunEvent {
    Triggered,
    Rejected,
    Completed { posts: usize, duration_ms: u64 },
    Failed { error: String, duration_ms: u64 },
}

impl RunEvent {
    /// Log this event.
    pub fn log(&self) {
        match self {
            RunEvent::Triggered => {
                tracing::info!("Collection run started");
            }
            RunEvent::Rejected => {
                tracing::warn!("Trigger rejected, a run is already in flight");
            }
            RunEvent::Completed { posts, duration_ms } => {
                tracing::info!(
                    posts = %posts,
                    duration_ms = %duration_ms,
                    "Collection run completed"
                );
            }
            RunEvent::Failed { error, duration_ms } => {
                tracing::error!(
                    error = %error,
                    duration_ms = %duration_ms,
                    "Collection run failed"
                );
            }
        }
    }
}
