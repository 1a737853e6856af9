//! Dotted numeric engine versions (`major.minor.patch[.build]`)
//!
//! Upstream tags carry a fourth build component on some release lines, which
//! rules out strict semver parsing. Ordering is purely numeric, component by
//! component.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Engine release version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineVersion {
    components: Vec<u64>,
}

impl EngineVersion {
    /// Parse `major.minor.patch` or `major.minor.patch.build`
    pub fn parse(s: &str) -> Result<Self> {
        let components = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::invalid_version(s));
                }
                part.parse::<u64>().map_err(|_| Error::invalid_version(s))
            })
            .collect::<Result<Vec<_>>>()?;

        if !(3..=4).contains(&components.len()) {
            return Err(Error::invalid_version(s));
        }

        Ok(Self { components })
    }

    pub fn major(&self) -> u64 {
        self.components[0]
    }

    pub fn minor(&self) -> u64 {
        self.components[1]
    }

    pub fn patch(&self) -> u64 {
        self.components[2]
    }

    /// Optional fourth component
    pub fn build(&self) -> Option<u64> {
        self.components.get(3).copied()
    }
}

impl Ord for EngineVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl PartialOrd for EngineVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl FromStr for EngineVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for EngineVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EngineVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
