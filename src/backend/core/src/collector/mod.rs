//! The external collector contract.
//!
//! A collector performs one long-running extraction (browser automation, AI
//! agents, ...) and returns a validated [`PostList`] or a human-readable
//! failure message. The [`JobController`](crate::jobs::JobController) treats it
//! as opaque and never retries it.

mod command;

pub use command::CommandCollector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::config::CollectorConfig;
use crate::error::{ErrorCode, PostwatchError};

/// One post as reported by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPayload {
    pub url: String,
    pub image_url: String,
    pub title: String,
    pub description: String,
}

/// The result set of one successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostList {
    pub posts: Vec<PostPayload>,
}

impl PostList {
    pub fn new(posts: Vec<PostPayload>) -> Self {
        Self { posts }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Why a collection attempt produced no usable result.
///
/// `Display` yields exactly the message that ends up in the run status and the
/// history log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectorError {
    /// The collector itself reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The collector produced output that failed content checks.
    #[error("{0}")]
    Invalid(String),

    /// The collector did not finish in time.
    #[error("Collector timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<CollectorError> for PostwatchError {
    fn from(error: CollectorError) -> Self {
        let code = match &error {
            CollectorError::Failed(_) => ErrorCode::CollectorFailed,
            CollectorError::Invalid(_) => ErrorCode::CollectorOutputInvalid,
            CollectorError::TimedOut(_) => ErrorCode::CollectorTimeout,
        };
        PostwatchError::new(code, error.to_string())
    }
}

pub type CollectResult = std::result::Result<PostList, CollectorError>;

/// An opaque, possibly slow and unreliable source of posts.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> CollectResult;
}

/// Stand-in used when no collector command is configured; every run fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCollector;

#[async_trait]
impl Collector for UnconfiguredCollector {
    async fn collect(&self) -> CollectResult {
        Err(CollectorError::Failed(
            "No collector command configured".to_string(),
        ))
    }
}

/// Content checks applied to collector output before it is accepted.
#[derive(Debug, Clone)]
pub struct PostValidator {
    url_prefix: String,
    path_marker: String,
}

impl PostValidator {
    pub fn new(url_prefix: impl Into<String>, path_marker: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into(),
            path_marker: path_marker.into(),
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(&config.post_url_prefix, &config.post_path_marker)
    }

    /// Check every post; the first offending post is reported in full.
    pub fn validate(&self, list: &PostList) -> Result<(), CollectorError> {
        let mut seen = HashSet::with_capacity(list.posts.len());

        for post in &list.posts {
            let url_ok = post.url.starts_with(&self.url_prefix)
                && post.url.contains(&self.path_marker);
            let image_ok =
                post.image_url.starts_with("http://") || post.image_url.starts_with("https://");

            if !url_ok
                || !image_ok
                || post.title.trim().is_empty()
                || post.description.trim().is_empty()
            {
                let rendered = serde_json::to_string(post).unwrap_or_else(|_| post.url.clone());
                return Err(CollectorError::Invalid(format!(
                    "Invalid post data format: {}",
                    rendered
                )));
            }

            if !seen.insert(post.url.as_str()) {
                return Err(CollectorError::Invalid(format!(
                    "Duplicate post url: {}",
                    post.url
                )));
            }
        }

        Ok(())
    }

    /// Parse raw collector output and validate it.
    pub fn parse(&self, raw: &str) -> CollectResult {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CollectorError::Failed(
                "No result returned from collector".to_string(),
            ));
        }

        let list: PostList = serde_json::from_str(raw)
            .map_err(|e| CollectorError::Invalid(format!("Error parsing result: {}", e)))?;
        self.validate(&list)?;
        Ok(list)
    }
}

impl Default for PostValidator {
    fn default() -> Self {
        Self::from_config(&CollectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(url: &str, image_url: &str) -> PostPayload {
        PostPayload {
            url: url.to_string(),
            image_url: image_url.to_string(),
            title: "Soirée jazz".to_string(),
            description: "Concert le vendredi soir".to_string(),
        }
    }

    #[test]
    fn test_accepts_valid_posts() {
        let list = PostList::new(vec![
            post("https://www.instagram.com/p/abc/", "https://cdn.example.com/1.jpg"),
            post("https://www.instagram.com/p/def/", "http://cdn.example.com/2.jpg"),
        ]);
        assert!(PostValidator::default().validate(&list).is_ok());
    }

    #[test]
    fn test_rejects_foreign_url() {
        let list = PostList::new(vec![post(
            "https://example.com/p/abc/",
            "https://cdn.example.com/1.jpg",
        )]);
        let err = PostValidator::default().validate(&list).unwrap_err();
        assert!(err.to_string().starts_with("Invalid post data format:"));
    }

    #[test]
    fn test_rejects_url_without_post_marker() {
        let list = PostList::new(vec![post(
            "https://www.instagram.com/somebody/",
            "https://cdn.example.com/1.jpg",
        )]);
        assert!(PostValidator::default().validate(&list).is_err());
    }

    #[test]
    fn test_rejects_blank_fields() {
        let mut p = post("https://www.instagram.com/p/abc/", "https://cdn.example.com/1.jpg");
        p.description = "   ".to_string();
        let list = PostList::new(vec![p]);
        assert!(PostValidator::default().validate(&list).is_err());
    }

    #[test]
    fn test_rejects_non_http_image() {
        let list = PostList::new(vec![post(
            "https://www.instagram.com/p/abc/",
            "data:image/png;base64,AAAA",
        )]);
        assert!(PostValidator::default().validate(&list).is_err());
    }

    #[test]
    fn test_rejects_duplicate_urls() {
        let list = PostList::new(vec![
            post("https://www.instagram.com/p/abc/", "https://cdn.example.com/1.jpg"),
            post("https://www.instagram.com/p/abc/", "https://cdn.example.com/2.jpg"),
        ]);
        let err = PostValidator::default().validate(&list).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate post url: https://www.instagram.com/p/abc/"
        );
    }

    #[test]
    fn test_parse_errors() {
        let validator = PostValidator::default();
        assert_eq!(
            validator.parse("  \n").unwrap_err(),
            CollectorError::Failed("No result returned from collector".to_string())
        );
        let err = validator.parse("{\"posts\": 3}").unwrap_err();
        assert!(err.to_string().starts_with("Error parsing result:"));
    }

    #[test]
    fn test_parse_valid_output() {
        let raw = r#"{"posts": [{"url": "https://www.instagram.com/p/xyz/",
            "image_url": "https://cdn.example.com/x.jpg",
            "title": "Marché de Noël", "description": "Le 12 décembre"}]}"#;
        let list = PostValidator::default().parse(raw).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.posts[0].title, "Marché de Noël");
    }

    #[test]
    fn test_error_message_survives_conversion() {
        let error = PostwatchError::from(CollectorError::Failed("timeout".to_string()));
        assert_eq!(error.code(), ErrorCode::CollectorFailed);
        assert_eq!(error.describe(), "timeout");

        let error = PostwatchError::from(CollectorError::TimedOut(Duration::from_secs(900)));
        assert_eq!(error.code(), ErrorCode::CollectorTimeout);
        assert_eq!(error.describe(), "Collector timed out after 900s");
    }

    #[test]
    fn test_empty_list_is_valid() {
        let list = PostValidator::default().parse("{\"posts\": []}").unwrap();
        assert!(list.is_empty());
    }
}
