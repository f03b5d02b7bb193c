//! HTTP client for communicating with the Postwatch API server.

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Error body returned by the server.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

/// HTTP client for the Postwatch API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a GET request and deserialize the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        decode(resp, &url).await
    }

    /// Perform a body-less POST request and deserialize the JSON body.
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "POST");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        decode(resp, &url).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => anyhow::bail!(
                "API error ({}{}): {}",
                status,
                err.code.map(|c| format!(", {}", c)).unwrap_or_default(),
                err.error
            ),
            Err(_) => anyhow::bail!("API error ({}): {}", status, body),
        }
    }

    resp.json()
        .await
        .with_context(|| format!("Failed to parse response from {}", url))
}
