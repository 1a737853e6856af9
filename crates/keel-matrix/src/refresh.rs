//! Matrix refresh: upstream → resolver → persisted artifact

use crate::cache::{AssetCache, CacheStats};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::resolver::Resolver;
use crate::upstream::{CachedSource, GitHubReleases, UpstreamSource};
use camino::{Utf8Path, Utf8PathBuf};
use keel_core::KeelConfig;
use tracing::info;

/// Result of a refresh run
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub matrix: Matrix,
    /// Whether the matrix file was rewritten
    pub changed: bool,
    pub path: Utf8PathBuf,
}

/// The GitHub source behind the on-disk asset cache configured in `config`
pub fn cached_github_source(
    config: &KeelConfig,
    offline: bool,
) -> Result<CachedSource<GitHubReleases>> {
    let github = GitHubReleases::new(
        config.upstream.clone(),
        &config.network,
        config.retry.clone(),
    )?;

    let cache_dir = config.paths.resolved_cache_dir();
    info!("Using asset cache at {}", cache_dir);
    let mut cache = AssetCache::on_disk(cache_dir);
    if offline {
        cache = cache.offline();
    }

    Ok(CachedSource::new(github, cache))
}

/// Resolve the matrix from `source` and persist it to `path`
pub async fn refresh_matrix(
    config: &KeelConfig,
    source: &dyn UpstreamSource,
    path: &Utf8Path,
) -> Result<RefreshOutcome> {
    let matrix = Resolver::new(config)?.resolve(source).await?;
    let changed = matrix.save(path)?;

    if changed {
        info!("Wrote {} matrix entries to {}", matrix.len(), path);
    } else {
        info!("Matrix {} is up to date", path);
    }

    Ok(RefreshOutcome {
        matrix,
        changed,
        path: path.to_path_buf(),
    })
}

/// Refresh through the cached GitHub source; also returns cache counters
pub async fn refresh_from_github(
    config: &KeelConfig,
    offline: bool,
) -> Result<(RefreshOutcome, CacheStats)> {
    let source = cached_github_source(config, offline)?;
    let outcome = refresh_matrix(config, &source, &config.paths.matrix_file).await?;
    Ok((outcome, source.cache().stats()))
}
