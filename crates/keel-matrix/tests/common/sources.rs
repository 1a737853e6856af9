//! In-process upstream sources

use async_trait::async_trait;
use keel_matrix::upstream::{file_name, UpstreamRelease, UpstreamSource};
use keel_matrix::Result;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed release list; the digest of a file is derived from its name
pub struct StaticSource {
    releases: Vec<UpstreamRelease>,
    listings: AtomicUsize,
    hashes: AtomicUsize,
}

impl StaticSource {
    pub fn new(releases: Vec<UpstreamRelease>) -> Self {
        Self {
            releases,
            listings: AtomicUsize::new(0),
            hashes: AtomicUsize::new(0),
        }
    }

    pub fn listing_calls(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn hash_calls(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }
}

/// Digest `StaticSource` reports for a URL
pub fn fake_digest(url: &str) -> String {
    format!("sha-{}", file_name(url))
}

#[async_trait]
impl UpstreamSource for StaticSource {
    async fn list_releases(&self) -> Result<Vec<UpstreamRelease>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.releases.clone())
    }

    async fn sha256(&self, url: &str) -> Result<String> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        Ok(fake_digest(url))
    }
}

/// `&StaticSource` can be wrapped in a `CachedSource` while the test keeps
/// the counters
#[async_trait]
impl<'a> UpstreamSource for &'a StaticSource {
    async fn list_releases(&self) -> Result<Vec<UpstreamRelease>> {
        (**self).list_releases().await
    }

    async fn sha256(&self, url: &str) -> Result<String> {
        (**self).sha256(url).await
    }
}
