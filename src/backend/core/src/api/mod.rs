//! HTTP API for Postwatch.
//!
//! | Method | Path              | Purpose                              |
//! |--------|-------------------|--------------------------------------|
//! | POST   | `/trigger-scrape` | start a run (409 while one is active)|
//! | GET    | `/status`         | current run status                   |
//! | GET    | `/posts`          | stored posts, `?limit=N`             |
//! | GET    | `/history`        | run history, `?limit=N`              |
//! | GET    | `/health`         | liveness and database reachability   |
//! | GET    | `/metrics`        | Prometheus text format               |
//! | GET    | `/static/*`       | static files, including cached images|

pub mod handlers;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::jobs::JobController;
use crate::store::PostStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<JobController>,
    pub store: PostStore,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(controller: Arc<JobController>) -> Self {
        let store = controller.store().clone();
        Self {
            controller,
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// CORS policy; an empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Build the API router.
///
/// ```rust,ignore
/// let state = AppState::new(controller).with_metrics(handle);
/// let app = build_router(state, Path::new("static"), &config.server.cors_origins);
/// ```
pub fn build_router(state: AppState, static_dir: &Path, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/trigger-scrape", post(handlers::trigger_scrape))
        .route("/status", get(handlers::get_status))
        .route("/posts", get(handlers::get_posts))
        .route("/history", get(handlers::get_history))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}
