//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Project config (`keel.yaml`, or the path given with `--config`)
//! 3. Environment variables (KEEL_* prefix)
//! 4. CLI flags (handled by caller)
//!
//! The project file is deep-merged over the defaults before deserializing, so
//! it only needs to name the keys it changes.

use crate::error::{Error, Result};
use crate::types::{Architecture, KeelConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::{Mapping, Value};
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "keel-defaults.yaml";

/// Default project config file name
pub const PROJECT_CONFIG_FILE: &str = "keel.yaml";

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Project config file; a missing default file is not an error
    project_file: Utf8PathBuf,
    /// Whether the project file was named explicitly
    explicit: bool,
}

impl ConfigLoader {
    /// Loader for `keel.yaml` in the current directory
    pub fn new() -> Self {
        Self {
            project_file: Utf8PathBuf::from(PROJECT_CONFIG_FILE),
            explicit: false,
        }
    }

    /// Loader for an explicit config path, which must exist
    pub fn with_file(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project_file: path.into(),
            explicit: true,
        }
    }

    /// Load configuration with hierarchical precedence
    pub fn load(&self) -> Result<KeelConfig> {
        let mut merged = Self::load_embedded_defaults()?;

        if self.project_file.exists() {
            debug!("Loading project config from {}", self.project_file);
            let overlay = Self::load_yaml_file(&self.project_file)?;
            merge_values(&mut merged, overlay);
        } else if self.explicit {
            return Err(Error::config_not_found(self.project_file.as_str()));
        }

        let config: KeelConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("{}", e)))?;

        let config = apply_env_overrides(config)?;
        validate(&config)?;
        Ok(config)
    }

    /// Parse a config document on its own, merged over the embedded defaults
    pub fn from_yaml_str(yaml: &str) -> Result<KeelConfig> {
        let mut merged = Self::load_embedded_defaults()?;
        let overlay: Value = serde_yaml_ng::from_str(yaml)?;
        merge_values(&mut merged, overlay);
        let config: KeelConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("{}", e)))?;
        validate(&config)?;
        Ok(config)
    }

    fn load_embedded_defaults() -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(DEFAULTS_FILE).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", DEFAULTS_FILE))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", DEFAULTS_FILE))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                DEFAULTS_FILE, e
            ))
        })
    }

    fn load_yaml_file(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, everything
/// else (including sequences) is replaced
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            merge_mappings(base_map, overlay_map);
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

fn merge_mappings(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_values(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid_config(format!("{} must be a valid number", name)))
}

/// Apply environment variable overrides
fn apply_env_overrides(mut config: KeelConfig) -> Result<KeelConfig> {
    if let Ok(val) = env::var("KEEL_UPSTREAM_OWNER") {
        config.upstream.owner = val;
    }

    if let Ok(val) = env::var("KEEL_UPSTREAM_REPO") {
        config.upstream.repo = val;
    }

    if let Ok(val) = env::var("KEEL_IMAGE_REPOSITORY") {
        config.image.repository = val;
    }

    if let Ok(val) = env::var("KEEL_HTTP_TIMEOUT_SECS") {
        config.network.http_timeout_secs = parse_env("KEEL_HTTP_TIMEOUT_SECS", &val)?;
    }

    if let Ok(val) = env::var("KEEL_READINESS_TIMEOUT_SECS") {
        config.test.readiness_timeout_secs = parse_env("KEEL_READINESS_TIMEOUT_SECS", &val)?;
    }

    if let Ok(val) = env::var("KEEL_CACHE_DIR") {
        config.paths.cache_dir = Some(Utf8PathBuf::from(val));
    }

    if let Ok(val) = env::var("KEEL_LOG_DIR") {
        config.paths.log_dir = Utf8PathBuf::from(val);
    }

    if config.upstream.token.is_none() {
        config.upstream.token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    }

    Ok(config)
}

const MAX_PER_PAGE: u32 = 100;

fn validate(config: &KeelConfig) -> Result<()> {
    let variants = &config.variants;

    if variants.all.is_empty() {
        return Err(Error::invalid_config("variants.all must not be empty"));
    }

    if !variants.contains(&variants.default) {
        return Err(Error::unknown_variant(variants.default.as_str()));
    }

    for (major, excluded) in variants.exclusions.iter() {
        for variant in excluded {
            if !variants.contains(variant) {
                return Err(Error::invalid_config(format!(
                    "exclusion for major {} names unknown variant '{}'",
                    major, variant
                )));
            }
        }
    }

    for arch in Architecture::ALL {
        let entry = config.architectures.iter().find(|a| a.name == arch);
        match entry {
            Some(a) if !a.keywords.is_empty() => {}
            Some(_) => {
                return Err(Error::invalid_config(format!(
                    "architecture {} needs at least one keyword",
                    arch
                )))
            }
            None => {
                return Err(Error::invalid_config(format!(
                    "architecture {} is not configured",
                    arch
                )))
            }
        }
    }

    if config.architectures.len() != Architecture::ALL.len() {
        return Err(Error::invalid_config(
            "each architecture must be configured exactly once",
        ));
    }

    regex::Regex::new(&config.upstream.stable_tag_pattern).map_err(|e| {
        Error::invalid_config(format!("upstream.stable-tag-pattern is not a valid regex: {}", e))
    })?;

    // GitHub caps a page at 100; a larger request reads as a short last page
    if !(1..=MAX_PER_PAGE).contains(&config.upstream.per_page) {
        return Err(Error::invalid_config(format!(
            "upstream.per-page must be between 1 and {}, got {}",
            MAX_PER_PAGE, config.upstream.per_page
        )));
    }

    if config.test.poll_interval_ms == 0 {
        return Err(Error::invalid_config("test.poll-interval-ms must be positive"));
    }

    Ok(())
}
