//! # keel-matrix
//!
//! Release matrix resolution for Keel.
//!
//! The flow is linear:
//!
//! ```text
//! UpstreamSource ─► AssetCache ─► Resolver ─► Matrix (matrix.json) ─► enumerate_targets
//! ```
//!
//! Remote lookups happen once, up front, in [`refresh`]. Everything after the
//! persisted [`Matrix`] is pure and deterministic.

pub mod cache;
pub mod enumerate;
pub mod error;
pub mod matrix;
pub mod refresh;
pub mod resolver;
pub mod upstream;

pub use cache::{AssetCache, CacheStats, CacheStore, FsCacheStore, MemoryCacheStore};
pub use enumerate::{enumerate_targets, TargetFilter};
pub use error::{MatrixError, Result};
pub use matrix::Matrix;
pub use refresh::{cached_github_source, refresh_from_github, refresh_matrix, RefreshOutcome};
pub use resolver::{build_matrix, Resolver};
pub use upstream::{CachedSource, GitHubReleases, UpstreamRelease, UpstreamSource};
