//! Content keys for cached images.

use sha2::{Digest, Sha256};
use std::fmt;

/// Extension of every canonicalized image.
pub const CANONICAL_EXTENSION: &str = "jpg";

/// Stable key of a cached image, derived from its source URL.
///
/// The same URL always maps to the same key, and so to the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey(String);

impl ImageKey {
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(hex::encode(digest))
    }

    /// Hex digest without extension.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<digest>.jpg`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, CANONICAL_EXTENSION)
    }

    /// Unique scratch name used while a download is in flight.
    pub fn temp_file_name(&self) -> String {
        format!("{}.{}.part", self.0, uuid::Uuid::new_v4().simple())
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_sha256_hex() {
        let key = ImageKey::from_url("https://cdn.example.com/a.jpg");
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            ImageKey::from_url("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_same_url_same_file() {
        let a = ImageKey::from_url("https://cdn.example.com/a.jpg");
        let b = ImageKey::from_url("https://cdn.example.com/a.jpg");
        let c = ImageKey::from_url("https://cdn.example.com/b.jpg");
        assert_eq!(a.file_name(), b.file_name());
        assert_ne!(a.file_name(), c.file_name());
        assert!(a.file_name().ends_with(".jpg"));
    }

    #[test]
    fn test_temp_names_are_unique() {
        let key = ImageKey::from_url("https://cdn.example.com/a.jpg");
        let first = key.temp_file_name();
        assert_ne!(first, key.temp_file_name());
        assert!(first.starts_with(key.as_str()));
        assert!(first.ends_with(".part"));
    }
}
