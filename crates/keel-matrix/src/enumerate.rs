//! Target Enumerator
//!
//! Expands the matrix into concrete (version, variant) build targets,
//! optionally narrowed by a version prefix and a single variant.

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use keel_core::types::{BuildTarget, DistributionVariant};
use tracing::{debug, warn};

/// Caller-supplied narrowing of the target set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    /// String prefix of the dotted version ("5" matches "5.0.2")
    pub version_prefix: Option<String>,

    /// Keep only this variant's tags
    pub variant: Option<DistributionVariant>,
}

impl TargetFilter {
    pub fn new(version_prefix: Option<String>, variant: Option<DistributionVariant>) -> Self {
        Self {
            version_prefix,
            variant,
        }
    }

    /// Human-readable form for error messages
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(prefix) = &self.version_prefix {
            parts.push(format!("version={}", prefix));
        }
        if let Some(variant) = &self.variant {
            parts.push(format!("variant={}", variant));
        }
        if parts.is_empty() {
            "the current matrix".to_string()
        } else {
            parts.join(", ")
        }
    }

    fn matches_version(&self, version: &str) -> bool {
        self.version_prefix
            .as_deref()
            .map_or(true, |prefix| version.starts_with(prefix))
    }

    fn matches_variant(&self, variant: &DistributionVariant) -> bool {
        self.variant.as_ref().map_or(true, |wanted| wanted == variant)
    }
}

/// Ordered build targets for `filter`; an empty result is [`MatrixError::NoMatch`]
///
/// Matrix order is preserved, and within one entry variants follow the tag set
/// order. Entries without any download are skipped since there is nothing to
/// build for them.
pub fn enumerate_targets(matrix: &Matrix, filter: &TargetFilter) -> Result<Vec<BuildTarget>> {
    let mut targets = Vec::new();

    for entry in matrix.entries() {
        let version = entry.asset.version.to_string();
        if !filter.matches_version(&version) {
            continue;
        }
        if entry.asset.downloads.is_empty() {
            warn!("Skipping {}: no downloads for any supported architecture", version);
            continue;
        }

        for (variant, tags) in entry.tags.iter() {
            if !filter.matches_variant(variant) || tags.is_empty() {
                continue;
            }
            targets.push(BuildTarget {
                version: entry.asset.version.clone(),
                variant: variant.clone(),
                release: entry.asset.clone(),
                tags: tags.to_vec(),
            });
        }
    }

    if targets.is_empty() {
        return Err(MatrixError::no_match(filter.describe()));
    }

    debug!("Enumerated {} targets for {}", targets.len(), filter.describe());
    Ok(targets)
}
