//! Builders for upstream release records

use keel_matrix::upstream::{UpstreamAsset, UpstreamRelease};

/// Base URL used for fake download links
pub const DOWNLOAD_BASE: &str = "https://downloads.example.com";

/// Builder for [`UpstreamRelease`] with stable, non-draft defaults
#[derive(Debug, Clone)]
pub struct ReleaseBuilder {
    tag_name: String,
    prerelease: bool,
    draft: bool,
    assets: Vec<UpstreamAsset>,
}

impl ReleaseBuilder {
    /// Release tagged `v<version>` with no assets
    pub fn version(version: &str) -> Self {
        Self {
            tag_name: format!("v{}", version),
            prerelease: false,
            draft: false,
            assets: Vec::new(),
        }
    }

    /// Release with a literal tag
    pub fn tag(tag: &str) -> Self {
        Self {
            tag_name: tag.to_string(),
            prerelease: false,
            draft: false,
            assets: Vec::new(),
        }
    }

    pub fn prerelease(mut self) -> Self {
        self.prerelease = true;
        self
    }

    pub fn draft(mut self) -> Self {
        self.draft = true;
        self
    }

    /// Add a download with an arbitrary file name
    pub fn file(mut self, file_name: &str) -> Self {
        self.assets.push(UpstreamAsset {
            browser_download_url: format!("{}/{}/{}", DOWNLOAD_BASE, self.tag_name, file_name),
        });
        self
    }

    /// Add a download with a full URL
    pub fn url(mut self, url: &str) -> Self {
        self.assets.push(UpstreamAsset {
            browser_download_url: url.to_string(),
        });
        self
    }

    /// Add the usual linux amd64 and arm64 archives
    pub fn with_linux_archives(self) -> Self {
        let version = self.tag_name.trim_start_matches('v').to_string();
        self.file(&format!("dbengine-{}-linux-amd64.tar.gz", version))
            .file(&format!("dbengine-{}-linux-arm64.tar.gz", version))
    }

    pub fn build(self) -> UpstreamRelease {
        UpstreamRelease {
            tag_name: self.tag_name,
            prerelease: self.prerelease,
            draft: self.draft,
            assets: self.assets,
        }
    }
}

/// Stable releases with both archives for each version
pub fn stable_releases(versions: &[&str]) -> Vec<UpstreamRelease> {
    versions
        .iter()
        .map(|v| ReleaseBuilder::version(v).with_linux_archives().build())
        .collect()
}
