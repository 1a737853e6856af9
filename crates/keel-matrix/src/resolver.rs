//! Release Matrix Resolver
//!
//! Turns raw upstream releases into the ordered, tagged matrix:
//!
//! 1. keep stable releases (tag matches the stable pattern, not a prerelease
//!    or draft)
//! 2. pick one non-debug download per supported architecture
//! 3. group by major version, majors descending, versions descending within
//!    each major
//! 4. expand variants per major (minus the exclusion table) and compute tag
//!    aliases from the explicit positions `i` (within major) and `g` (major
//!    group within the matrix)

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::upstream::{file_name, UpstreamRelease, UpstreamSource};
use keel_core::types::{
    Architecture, ArchitectureConfig, DistributionVariant, DownloadDescriptor, KeelConfig,
    MatrixEntry, ReleaseAsset, TagSet, VariantsConfig,
};
use keel_core::EngineVersion;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Tag alias for the newest release of the whole matrix, default variant
pub const LATEST_TAG: &str = "latest";

/// File suffixes that are never engine archives
const SIDECAR_SUFFIXES: &[&str] = &[".sha256", ".sha512", ".md5", ".asc", ".sig", ".pem"];

/// A stable release with its selected download URLs, before hashing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableRelease {
    pub version: EngineVersion,
    pub downloads: BTreeMap<Architecture, String>,
}

/// Classifies download file names by architecture
#[derive(Debug, Clone)]
pub struct ArchitectureMatcher {
    keywords: Vec<(Architecture, Vec<String>)>,
}

impl ArchitectureMatcher {
    pub fn new(architectures: &[ArchitectureConfig]) -> Self {
        Self {
            keywords: architectures
                .iter()
                .map(|a| {
                    let words = a.keywords.iter().map(|k| k.to_lowercase()).collect();
                    (a.name, words)
                })
                .collect(),
        }
    }

    /// The single architecture `file_name` belongs to; `None` when no
    /// architecture or more than one matches
    pub fn classify(&self, file_name: &str) -> Option<Architecture> {
        let lower = file_name.to_lowercase();
        let mut matched = self
            .keywords
            .iter()
            .filter(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map(|(arch, _)| *arch);

        match (matched.next(), matched.next()) {
            (Some(arch), None) => Some(arch),
            _ => None,
        }
    }
}

/// Whether a file name marks a debug build
pub fn is_debug_artifact(file_name: &str) -> bool {
    file_name.to_lowercase().contains("debug")
}

fn is_sidecar(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SIDECAR_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Filters upstream releases down to stable, parsed releases
#[derive(Debug, Clone)]
pub struct ReleaseFilter {
    stable_tag: Regex,
    matcher: ArchitectureMatcher,
}

impl ReleaseFilter {
    pub fn new(config: &KeelConfig) -> Result<Self> {
        let stable_tag = Regex::new(&config.upstream.stable_tag_pattern).map_err(|e| {
            keel_core::Error::invalid_config(format!("stable-tag-pattern: {}", e))
        })?;
        Ok(Self {
            stable_tag,
            matcher: ArchitectureMatcher::new(&config.architectures),
        })
    }

    /// Parse the version out of a stable tag
    pub fn parse_tag(&self, tag: &str) -> Result<EngineVersion> {
        let raw = tag.strip_prefix('v').unwrap_or(tag);
        EngineVersion::parse(raw).map_err(|e| MatrixError::parse(tag, e.to_string()))
    }

    /// Select one download per architecture
    ///
    /// Debug builds and checksum/signature sidecars are ignored. When several
    /// files match one architecture the lexicographically smallest URL wins so
    /// the choice is stable across runs.
    pub fn select_downloads(&self, release: &UpstreamRelease) -> BTreeMap<Architecture, String> {
        let mut selected: BTreeMap<Architecture, String> = BTreeMap::new();

        for asset in &release.assets {
            let url = &asset.browser_download_url;
            let name = file_name(url);
            if is_debug_artifact(&name) || is_sidecar(&name) {
                continue;
            }
            let Some(arch) = self.matcher.classify(&name) else {
                continue;
            };
            let replace = !matches!(selected.get(&arch), Some(existing) if existing <= url);
            if replace {
                selected.insert(arch, url.clone());
            } else {
                debug!("{}: ignoring extra {} download {}", release.tag_name, arch, url);
            }
        }

        selected
    }

    /// Stable releases in upstream order; malformed tags are logged and skipped
    pub fn stable_releases(&self, releases: &[UpstreamRelease]) -> Vec<StableRelease> {
        releases
            .iter()
            .filter(|r| !r.prerelease && !r.draft && self.stable_tag.is_match(&r.tag_name))
            .filter_map(|r| match self.parse_tag(&r.tag_name) {
                Ok(version) => Some(StableRelease {
                    version,
                    downloads: self.select_downloads(r),
                }),
                Err(e) => {
                    warn!("Skipping release: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// `<base>` for the default variant, `<base>-<variant>` otherwise
fn suffixed(base: &str, variant: &DistributionVariant, is_default: bool) -> String {
    if is_default {
        base.to_string()
    } else {
        format!("{}-{}", base, variant)
    }
}

/// Tag list of one asset for one variant
///
/// Order is `[matrix-latest?, major?, exact-version]`; the exact version is
/// always present and last.
pub fn variant_tags(
    version: &EngineVersion,
    variant: &DistributionVariant,
    is_default: bool,
    index_in_major: usize,
    group_index: usize,
) -> Vec<String> {
    let mut tags = Vec::with_capacity(3);

    if group_index == 0 && index_in_major == 0 {
        tags.push(if is_default {
            LATEST_TAG.to_string()
        } else {
            variant.to_string()
        });
    }

    if index_in_major == 0 {
        tags.push(suffixed(&version.major().to_string(), variant, is_default));
    }

    tags.push(suffixed(&version.to_string(), variant, is_default));
    tags
}

/// Group, sort and tag resolved assets
pub fn build_matrix(assets: Vec<ReleaseAsset>, variants: &VariantsConfig) -> Matrix {
    let mut groups: BTreeMap<u64, Vec<ReleaseAsset>> = BTreeMap::new();
    for asset in assets {
        groups.entry(asset.major()).or_default().push(asset);
    }

    let mut entries = Vec::new();
    for (group_index, (major, mut group)) in groups.into_iter().rev().enumerate() {
        group.sort_by(|a, b| b.version.cmp(&a.version));
        let major_variants = variants.for_major(major);

        for (index_in_major, asset) in group.into_iter().enumerate() {
            let mut tags = TagSet::new();
            for variant in &major_variants {
                tags.insert(
                    variant.clone(),
                    variant_tags(
                        &asset.version,
                        variant,
                        variants.is_default(variant),
                        index_in_major,
                        group_index,
                    ),
                );
            }
            entries.push(MatrixEntry { asset, tags });
        }
    }

    Matrix::new(entries)
}

/// Resolves the full matrix from an upstream source
pub struct Resolver<'a> {
    config: &'a KeelConfig,
    filter: ReleaseFilter,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a KeelConfig) -> Result<Self> {
        Ok(Self {
            config,
            filter: ReleaseFilter::new(config)?,
        })
    }

    /// List releases, hash every selected download, then build the matrix
    ///
    /// Hashing is sequential so the asset cache only ever sees one writer.
    pub async fn resolve(&self, source: &dyn UpstreamSource) -> Result<Matrix> {
        let releases = source.list_releases().await?;
        let stable = self.filter.stable_releases(&releases);
        info!(
            "{} of {} upstream releases are stable",
            stable.len(),
            releases.len()
        );

        let mut assets = Vec::with_capacity(stable.len());
        for release in stable {
            let mut downloads = BTreeMap::new();
            for (arch, url) in release.downloads {
                let sha256 = source.sha256(&url).await?;
                downloads.insert(arch, DownloadDescriptor { url, sha256 });
            }
            if downloads.is_empty() {
                warn!(
                    "Release {} has no eligible downloads for any architecture",
                    release.version
                );
            }
            assets.push(ReleaseAsset {
                version: release.version,
                downloads,
            });
        }

        Ok(build_matrix(assets, &self.config.variants))
    }
}
