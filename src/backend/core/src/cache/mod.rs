//! Local image cache.
//!
//! Images referenced by collected posts are downloaded once, normalized to RGB
//! JPEG and stored under a content key derived from their source URL:
//!
//! ```text
//! https://cdn.example.com/v/abc.webp ──sha256──▶ static/images/<hex>.jpg
//! ```
//!
//! A file is live while a stored post references it. After every replace the
//! store calls [`ImageCache::cleanup_orphans`] with the live set and everything
//! else in the directory is removed.

pub mod key;

pub use key::{ImageKey, CANONICAL_EXTENSION};

use image::codecs::jpeg::JpegEncoder;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::ImageConfig;
use crate::error::{ErrorCode, PostwatchError, Result};
use crate::observability::metrics;

const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "en-US,en;q=0.9";

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a single image could not be materialized. Never leaves this module.
#[derive(Debug, Error)]
enum ImageError {
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("payload exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ImageError> for PostwatchError {
    fn from(error: ImageError) -> Self {
        let code = match &error {
            ImageError::Fetch(_) | ImageError::TooLarge { .. } => ErrorCode::ImageFetchFailed,
            ImageError::Decode(_) | ImageError::Join(_) => ErrorCode::ImageDecodeFailed,
            ImageError::Io(_) => ErrorCode::ImageWriteFailed,
        };
        PostwatchError::with_internal(code, "Failed to cache image", error.to_string())
            .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cleanup Report
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Image Cache
// ═══════════════════════════════════════════════════════════════════════════════

/// Content-addressed image store on the local filesystem.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
    client: reqwest::Client,
    max_bytes: usize,
    jpeg_quality: u8,
}

impl ImageCache {
    /// Create a cache rooted at `config.dir`.
    pub fn new(config: &ImageConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_IMAGES));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            dir: config.dir.clone(),
            client,
            max_bytes: config.max_bytes,
            jpeg_quality: config.jpeg_quality,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if needed.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Where the canonical copy of `source_url` lives, whether or not it exists yet.
    pub fn path_for(&self, source_url: &str) -> PathBuf {
        self.dir.join(ImageKey::from_url(source_url).file_name())
    }

    /// Return the local path of `source_url`, downloading it if necessary.
    ///
    /// Failures are logged and yield `None`; they never propagate.
    #[instrument(skip(self))]
    pub async fn materialize(&self, source_url: &str) -> Option<String> {
        let key = ImageKey::from_url(source_url);
        let path = self.dir.join(key.file_name());

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(key = %key, "Image already cached");
            metrics::record_image("cached");
            return Some(path.to_string_lossy().into_owned());
        }

        match self.fetch_and_store(source_url, &key, &path).await {
            Ok(()) => {
                debug!(key = %key, "Image downloaded");
                metrics::record_image("downloaded");
                Some(path.to_string_lossy().into_owned())
            }
            Err(e) => {
                PostwatchError::from(e)
                    .with_context("source_url", source_url)
                    .log();
                metrics::record_image("failed");
                None
            }
        }
    }

    async fn fetch_and_store(
        &self,
        source_url: &str,
        key: &ImageKey,
        path: &Path,
    ) -> std::result::Result<(), ImageError> {
        let mut response = self
            .client
            .get(source_url)
            .send()
            .await?
            .error_for_status()?;

        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ImageError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(ImageError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        let quality = self.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || canonicalize(&body, quality)).await??;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.dir.join(key.temp_file_name());
        if let Err(e) = tokio::fs::write(&tmp, &encoded).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Delete every regular file in the cache directory that is not in `live`.
    ///
    /// A missing directory is an empty cache. Per-file failures are counted and
    /// logged, never raised.
    #[instrument(skip(self, live), fields(live = live.len()))]
    pub async fn cleanup_orphans(&self, live: &HashSet<PathBuf>) -> CleanupReport {
        let mut report = CleanupReport::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list image cache");
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read image cache entry");
                    report.failed += 1;
                    break;
                }
            };

            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let path = entry.path();
            if !is_file || live.contains(&path) {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove orphaned image");
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 {
            info!(removed = report.removed, failed = report.failed, "Removed orphaned images");
            metrics::record_orphans_removed(report.removed);
        }

        report
    }
}

/// Decode any supported format and re-encode as RGB JPEG.
fn canonicalize(bytes: &[u8], quality: u8) -> std::result::Result<Vec<u8>, ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out)
}
