//! Durable storage of the current post set and the run history.
//!
//! [`PostStore`] glues the [`Database`] and the [`ImageCache`] together: images
//! are materialized before the transactional replace, and orphaned files are
//! swept only once the new set is committed.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

use crate::cache::{CleanupReport, ImageCache};
use crate::collector::PostPayload;
use crate::db::{Database, HistoryEntry, HistoryStatus, PostRecord, StoredPost};
use crate::error::Result;
use crate::observability::metrics;

#[derive(Clone)]
pub struct PostStore {
    db: Database,
    images: ImageCache,
    download_concurrency: usize,
}

impl PostStore {
    pub fn new(db: Database, images: ImageCache, download_concurrency: usize) -> Self {
        Self {
            db,
            images,
            download_concurrency: download_concurrency.max(1),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub async fn init_schema(&self) -> Result<()> {
        self.db.init_schema().await
    }

    /// Replace the stored result set with `posts`.
    ///
    /// Image failures only null out that post's `local_image_path`. A database
    /// failure propagates and leaves the previous set and its images in place.
    #[instrument(skip(self, posts), fields(count = posts.len()))]
    pub async fn replace(&self, posts: &[PostPayload]) -> Result<CleanupReport> {
        let records: Vec<PostRecord> = stream::iter(posts.iter().cloned())
            .map(|post| async move {
                let local_image_path = self.images.materialize(&post.image_url).await;
                PostRecord {
                    post,
                    local_image_path,
                }
            })
            .buffered(self.download_concurrency)
            .collect()
            .await;

        let missing = records
            .iter()
            .filter(|r| r.local_image_path.is_none())
            .count();
        if missing > 0 {
            warn!(missing, "Some images could not be cached");
        }

        self.db.replace_posts(&records).await?;
        metrics::set_current_posts(records.len());

        // Live set is the committed records, not a re-read.
        let live: HashSet<PathBuf> = records
            .iter()
            .filter_map(|r| r.local_image_path.as_deref())
            .map(PathBuf::from)
            .collect();
        let report = self.images.cleanup_orphans(&live).await;

        info!(
            stored = records.len(),
            images = records.len() - missing,
            orphans_removed = report.removed,
            "Post set replaced"
        );
        Ok(report)
    }

    pub async fn log_history(
        &self,
        status: HistoryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.db.log_history(status, error_message).await
    }

    pub async fn latest_posts(&self, limit: i64) -> Result<Vec<StoredPost>> {
        self.db.latest_posts(limit).await
    }

    pub async fn history(&self, limit: i64) -> Result<Vec<HistoryEntry>> {
        self.db.history(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageConfig;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([10, 120, 240]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    fn post(id: &str, image_url: String) -> PostPayload {
        PostPayload {
            url: format!("https://www.instagram.com/p/{}/", id),
            image_url,
            title: format!("title {}", id),
            description: format!("description {}", id),
        }
    }

    async fn store_in(dir: &Path) -> PostStore {
        let db = Database::connect_in_memory().await.unwrap();
        db.init_schema().await.unwrap();
        let images = ImageCache::new(&ImageConfig {
            dir: dir.to_path_buf(),
            ..ImageConfig::default()
        })
        .unwrap();
        PostStore::new(db, images, 2)
    }

    fn files_in(dir: &Path) -> HashSet<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_replace_caches_images_and_sweeps_orphans() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg_bytes()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let stale = dir.path().join("stale.jpg");
        std::fs::write(&stale, b"old").unwrap();

        let report = store
            .replace(&[
                post("a", format!("{}/ok.jpg", server.uri())),
                post("b", format!("{}/broken.jpg", server.uri())),
            ])
            .await
            .unwrap();
        assert_eq!(report.removed, 1);
        assert!(!stale.exists());

        let posts = store.latest_posts(10).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts[1].local_image_path.is_none());

        let cached = posts[0].local_image_path.clone().unwrap();
        assert!(Path::new(&cached).exists());

        // Every file on disk is referenced by a stored post.
        let referenced: HashSet<PathBuf> = [PathBuf::from(cached)].into_iter().collect();
        assert_eq!(files_in(dir.path()), referenced);
    }

    #[tokio::test]
    async fn test_replace_drops_images_of_previous_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg_bytes()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        store
            .replace(&[post("a", format!("{}/a.jpg", server.uri()))])
            .await
            .unwrap();
        store
            .replace(&[post("b", format!("{}/b.jpg", server.uri()))])
            .await
            .unwrap();

        let old = store.images().path_for(&format!("{}/a.jpg", server.uri()));
        let new = store.images().path_for(&format!("{}/b.jpg", server.uri()));
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[tokio::test]
    async fn test_sweep_follows_the_written_set_without_rereading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg_bytes()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        // Rows read back after the commit no longer name their image.
        sqlx::query(
            "CREATE TRIGGER strip_paths AFTER INSERT ON posts BEGIN \
             UPDATE posts SET local_image_path = NULL WHERE id = NEW.id; END",
        )
        .execute(store.database().pool())
        .await
        .unwrap();

        let url = format!("{}/a.jpg", server.uri());
        let report = store.replace(&[post("a", url.clone())]).await.unwrap();

        assert_eq!(report, CleanupReport::default());
        assert!(store.images().path_for(&url).exists());
    }

    #[tokio::test]
    async fn test_database_failure_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let existing = dir.path().join("existing.jpg");
        std::fs::write(&existing, b"keep").unwrap();

        sqlx::query("DROP TABLE posts")
            .execute(store.database().pool())
            .await
            .unwrap();

        assert!(store.replace(&[]).await.is_err());
        assert!(existing.exists());
    }
}
