//! Upstream release source
//!
//! Reads the engine's release listing from a GitHub-compatible API and hashes
//! release artifacts. [`CachedSource`] puts the asset cache in front of any
//! source so each listing and each artifact is fetched at most once.

use crate::cache::AssetCache;
use crate::error::{MatrixError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use keel_core::retry::retry_with_policy;
use keel_core::types::{NetworkConfig, RetryPolicy, UpstreamConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

/// Cache key of the release listing
pub const RELEASES_CACHE_KEY: &str = "releases";

/// Release record as published upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamRelease {
    /// Release tag (e.g., "v5.0.2")
    pub tag_name: String,

    /// Whether this is a prerelease
    #[serde(default)]
    pub prerelease: bool,

    /// Whether this is an unpublished draft
    #[serde(default)]
    pub draft: bool,

    /// Downloadable files
    #[serde(default)]
    pub assets: Vec<UpstreamAsset>,
}

/// Release file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamAsset {
    pub browser_download_url: String,
}

/// Source of release records and artifact digests
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// All published releases, newest first as the API returns them
    async fn list_releases(&self) -> Result<Vec<UpstreamRelease>>;

    /// Hex-encoded SHA-256 of the file at `url`
    async fn sha256(&self, url: &str) -> Result<String>;
}

/// GitHub releases API client
pub struct GitHubReleases {
    client: reqwest::Client,
    config: UpstreamConfig,
    retry: RetryPolicy,
}

impl GitHubReleases {
    pub fn new(config: UpstreamConfig, network: &NetworkConfig, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .timeout(Duration::from_secs(network.http_timeout_secs))
            .build()
            .map_err(|e| MatrixError::fetch(&config.api_url, None, e.to_string()))?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn releases_url(&self, page: u32) -> String {
        format!(
            "{}/repos/{}/{}/releases?per_page={}&page={}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            self.config.per_page,
            page
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MatrixError::fetch(url, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatrixError::fetch(
                url,
                Some(status.as_u16()),
                format!("HTTP {}", status),
            ));
        }

        Ok(response)
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<UpstreamRelease>> {
        let url = self.releases_url(page);
        retry_with_policy(&self.retry, "list releases", MatrixError::is_transient, || async {
            let response = self.get(&url).await?;
            response
                .json::<Vec<UpstreamRelease>>()
                .await
                .map_err(|e| MatrixError::fetch(&url, None, format!("invalid JSON: {}", e)))
        })
        .await
        .map_err(|e| e.into_inner())
    }

    async fn hash_once(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut total: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MatrixError::fetch(url, None, e.to_string()))?;
            total += chunk.len() as u64;
            hasher.update(&chunk);
        }

        debug!("Hashed {} bytes from {}", total, url);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[async_trait]
impl UpstreamSource for GitHubReleases {
    async fn list_releases(&self) -> Result<Vec<UpstreamRelease>> {
        let per_page = self.config.per_page.max(1) as usize;
        let mut releases = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(page).await?;
            let short_page = batch.len() < per_page;
            releases.extend(batch);
            if short_page {
                break;
            }
            page += 1;
        }

        info!(
            "Fetched {} releases from {}/{}",
            releases.len(),
            self.config.owner,
            self.config.repo
        );
        Ok(releases)
    }

    async fn sha256(&self, url: &str) -> Result<String> {
        retry_with_policy(&self.retry, "hash artifact", MatrixError::is_transient, || {
            self.hash_once(url)
        })
        .await
        .map_err(|e| e.into_inner())
    }
}

/// Wraps a source with the asset cache
pub struct CachedSource<S> {
    inner: S,
    cache: AssetCache,
}

impl<S: UpstreamSource> CachedSource<S> {
    pub fn new(inner: S, cache: AssetCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }
}

#[async_trait]
impl<S: UpstreamSource> UpstreamSource for CachedSource<S> {
    async fn list_releases(&self) -> Result<Vec<UpstreamRelease>> {
        self.cache
            .get_or_fetch(RELEASES_CACHE_KEY, || self.inner.list_releases())
            .await
    }

    async fn sha256(&self, url: &str) -> Result<String> {
        let key = format!("sha256/{}", file_name(url));
        self.cache.get_or_fetch(&key, || self.inner.sha256(url)).await
    }
}

/// Last path segment of a download URL
pub fn file_name(download_url: &str) -> String {
    match url::Url::parse(download_url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| download_url.to_string()),
        Err(_) => download_url
            .rsplit('/')
            .next()
            .unwrap_or(download_url)
            .to_string(),
    }
}
