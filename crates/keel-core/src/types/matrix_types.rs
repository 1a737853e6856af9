//! Release matrix data model
//!
//! These types form the persisted matrix artifact (`matrix.json`) and the
//! in-memory build targets derived from it. Field order and map ordering are
//! part of the on-disk contract: serializing the same matrix twice must yield
//! identical bytes.

use crate::version::EngineVersion;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Supported CPU architectures for published images
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    pub const ALL: [Architecture; 2] = [Architecture::Amd64, Architecture::Arm64];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }

    /// Docker platform string (`linux/amd64`)
    pub fn platform(&self) -> String {
        format!("linux/{}", self.as_str())
    }

    /// Architecture of the machine running the CLI, if it is one we publish
    pub fn host() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Some(Architecture::Amd64),
            "aarch64" => Some(Architecture::Arm64),
            _ => None,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single downloadable engine artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub url: String,
    pub sha256: String,
}

/// One stable upstream release with its per-architecture downloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub version: EngineVersion,

    /// Keyed by architecture; an architecture missing here is unavailable
    /// for this release
    #[serde(rename = "releases")]
    pub downloads: BTreeMap<Architecture, DownloadDescriptor>,
}

impl ReleaseAsset {
    pub fn major(&self) -> u64 {
        self.version.major()
    }

    pub fn architectures(&self) -> Vec<Architecture> {
        self.downloads.keys().copied().collect()
    }
}

/// Base-OS flavour an image family is built on (e.g. a distribution codename)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionVariant(String);

impl DistributionVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistributionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DistributionVariant {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Variants excluded per major version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantExclusionTable(BTreeMap<u64, BTreeSet<DistributionVariant>>);

impl VariantExclusionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(&mut self, major: u64, variant: DistributionVariant) {
        self.0.entry(major).or_default().insert(variant);
    }

    pub fn is_excluded(&self, major: u64, variant: &DistributionVariant) -> bool {
        self.0
            .get(&major)
            .map(|set| set.contains(variant))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &BTreeSet<DistributionVariant>)> {
        self.0.iter()
    }
}

/// Variant → ordered tag list, preserving variant insertion order
///
/// The first tag of each list is the canonical ("primary") tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(Vec<(DistributionVariant, Vec<String>)>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the tags of a variant, keeping its original position
    pub fn insert(&mut self, variant: DistributionVariant, tags: Vec<String>) {
        match self.0.iter_mut().find(|(v, _)| *v == variant) {
            Some((_, existing)) => *existing = tags,
            None => self.0.push((variant, tags)),
        }
    }

    pub fn get(&self, variant: &DistributionVariant) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(v, _)| v == variant)
            .map(|(_, tags)| tags.as_slice())
    }

    pub fn variants(&self) -> impl Iterator<Item = &DistributionVariant> {
        self.0.iter().map(|(v, _)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DistributionVariant, &[String])> {
        self.0.iter().map(|(v, tags)| (v, tags.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (variant, tags) in &self.0 {
            map.serialize_entry(variant, tags)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagSetVisitor;

        impl<'de> Visitor<'de> for TagSetVisitor {
            type Value = TagSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of variant to tag list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TagSet, A::Error> {
                let mut set = TagSet::new();
                while let Some((variant, tags)) =
                    access.next_entry::<DistributionVariant, Vec<String>>()?
                {
                    if tags.is_empty() {
                        return Err(serde::de::Error::custom(format!(
                            "variant '{}' has an empty tag list",
                            variant
                        )));
                    }
                    set.insert(variant, tags);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(TagSetVisitor)
    }
}

/// One record of the persisted matrix artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    #[serde(flatten)]
    pub asset: ReleaseAsset,
    pub tags: TagSet,
}

/// A concrete (version, variant) image to build, test or publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    pub version: EngineVersion,
    pub variant: DistributionVariant,
    pub release: ReleaseAsset,
    /// Never empty; the first tag is the primary tag
    pub tags: Vec<String>,
}

impl BuildTarget {
    pub fn primary_tag(&self) -> &str {
        // Targets are only constructed from non-empty tag lists
        self.tags.first().map(String::as_str).unwrap_or_default()
    }

    /// Human-readable identity used in logs and summaries
    pub fn label(&self) -> String {
        format!("{}/{}", self.version, self.variant)
    }
}
