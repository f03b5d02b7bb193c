//! Ways for the scheduler to start a run.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::JobController;
use crate::error::ErrorCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    /// A run was already in flight.
    #[error("a run is already in progress")]
    Conflict,

    #[error("trigger endpoint returned {0}")]
    Status(u16),

    #[error("trigger request failed: {0}")]
    Transport(String),

    #[error("trigger failed: {0}")]
    Rejected(String),
}

/// Something that can start a collection run.
#[async_trait]
pub trait TriggerClient: Send + Sync {
    async fn trigger(&self) -> Result<(), TriggerError>;
}

/// Triggers runs through the HTTP API of a (possibly remote) server.
#[derive(Debug, Clone)]
pub struct HttpTrigger {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTrigger {
    pub fn new(base_url: &str) -> Result<Self, TriggerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/trigger-scrape", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TriggerClient for HttpTrigger {
    async fn trigger(&self) -> Result<(), TriggerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(TriggerError::Conflict),
            status => Err(TriggerError::Status(status.as_u16())),
        }
    }
}

/// Triggers runs on a controller in the same process.
#[async_trait]
impl TriggerClient for Arc<JobController> {
    async fn trigger(&self) -> Result<(), TriggerError> {
        match JobController::trigger(self) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ErrorCode::RunInProgress => Err(TriggerError::Conflict),
            Err(e) => Err(TriggerError::Rejected(e.describe())),
        }
    }
}
