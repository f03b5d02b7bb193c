//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use postwatch_core::cache::ImageCache;
use postwatch_core::collector::{CollectResult, Collector, CollectorError, PostList, PostPayload};
use postwatch_core::config::ImageConfig;
use postwatch_core::db::Database;
use postwatch_core::jobs::JobController;
use postwatch_core::store::PostStore;

// ============================================================================
// Scripted Collector
// ============================================================================

#[derive(Debug, Clone)]
pub enum Outcome {
    Posts(PostList),
    Fail(String),
    Panic(&'static str),
}

/// Collector returning a fixed outcome, optionally held until released.
pub struct ScriptedCollector {
    outcome: Mutex<Outcome>,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
}

impl ScriptedCollector {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Each `collect` blocks until `release` is called once for it.
    pub fn gated(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            gate: Some(Semaphore::new(0)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    async fn collect(&self) -> CollectResult {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate closed")
                .forget();
        }

        let outcome = self.outcome.lock().clone();
        match outcome {
            Outcome::Posts(list) => Ok(list),
            Outcome::Fail(message) => Err(CollectorError::Failed(message)),
            Outcome::Panic(message) => panic!("{}", message),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn post(id: &str, image_url: &str) -> PostPayload {
    PostPayload {
        url: format!("https://www.instagram.com/p/{}/", id),
        image_url: image_url.to_string(),
        title: format!("Event {}", id),
        description: format!("Details for event {}", id),
    }
}

/// `n` posts whose images live under `image_base`.
pub fn posts(n: usize, image_base: &str) -> PostList {
    PostList::new(
        (0..n)
            .map(|i| post(&format!("post{}", i), &format!("{}/img{}.jpg", image_base, i)))
            .collect(),
    )
}

/// Image URL nobody answers on; downloads fail fast.
pub const DEAD_IMAGE_HOST: &str = "http://127.0.0.1:9";

pub fn jpeg_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(6, 6, Rgb([30, 160, 90]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

pub async fn test_store(images_dir: &Path) -> PostStore {
    let db = Database::connect_in_memory().await.unwrap();
    db.init_schema().await.unwrap();
    let images = ImageCache::new(&ImageConfig {
        dir: images_dir.to_path_buf(),
        ..ImageConfig::default()
    })
    .unwrap();
    PostStore::new(db, images, 2)
}

pub async fn test_controller(
    collector: Arc<ScriptedCollector>,
    images_dir: &Path,
) -> Arc<JobController> {
    let store = test_store(images_dir).await;
    Arc::new(JobController::new(collector, store))
}
