//! Configuration types for `keel.yaml`
//!
//! Every section has defaults; the embedded `keel-defaults.yaml` fills in
//! anything a project file leaves out.

use crate::types::matrix_types::{Architecture, DistributionVariant, VariantExclusionTable};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete Keel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeelConfig {
    /// Where upstream releases come from
    pub upstream: UpstreamConfig,

    /// Published image settings
    pub image: ImageConfig,

    /// Supported architectures and how to recognise their downloads
    pub architectures: Vec<ArchitectureConfig>,

    /// Distribution variants and per-major exclusions
    pub variants: VariantsConfig,

    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retry policy for remote lookups
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Container test settings
    pub test: TestConfig,

    /// Local paths
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Upstream release listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpstreamConfig {
    /// GitHub-compatible API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    pub owner: String,

    pub repo: String,

    /// Tags matching this pattern are stable release candidates
    #[serde(default = "default_stable_tag_pattern")]
    pub stable_tag_pattern: String,

    /// Release listing page size
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// API token; filled from `GITHUB_TOKEN` when unset
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_stable_tag_pattern() -> String {
    r"^v\d+\.\d+\.\d+(\.\d+)?$".to_string()
}
fn default_per_page() -> u32 {
    100
}

/// Image repository and build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageConfig {
    /// Image repository, e.g. `docker.io/acme/db`
    pub repository: String,

    /// Value of the `org.opencontainers.image.description` label
    #[serde(default)]
    pub description: String,

    /// Value of the `org.opencontainers.image.source` label
    #[serde(default)]
    pub source: String,

    /// Build context directory; supports `{major}`, `{variant}` and `{version}`
    #[serde(default = "default_context")]
    pub context: String,

    /// Extra `--build-arg` values passed to every build
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

fn default_context() -> String {
    "{major}/{variant}".to_string()
}

impl ImageConfig {
    /// Fully qualified reference for one tag
    pub fn reference(&self, tag: &str) -> String {
        format!("{}:{}", self.repository, tag)
    }
}

/// How to recognise one architecture's downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArchitectureConfig {
    pub name: Architecture,

    /// Substrings identifying this architecture in a download file name
    pub keywords: Vec<String>,
}

/// Distribution variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariantsConfig {
    /// Variant whose tags carry no suffix
    pub default: DistributionVariant,

    /// All variants, in tag-set order
    pub all: Vec<DistributionVariant>,

    /// Variants excluded per major version
    #[serde(default)]
    pub exclusions: VariantExclusionTable,
}

impl VariantsConfig {
    /// Variants built for a major version, in configured order
    pub fn for_major(&self, major: u64) -> Vec<DistributionVariant> {
        self.all
            .iter()
            .filter(|v| !self.exclusions.is_excluded(major, v))
            .cloned()
            .collect()
    }

    pub fn is_default(&self, variant: &DistributionVariant) -> bool {
        *variant == self.default
    }

    pub fn contains(&self, variant: &DistributionVariant) -> bool {
        self.all.contains(variant)
    }
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    300
}
fn default_user_agent() -> String {
    format!(
        "keel/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Retry policy for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: RetryStrategy,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Single attempt
    None,

    /// Fixed delay between attempts
    Fixed,

    /// Exponential backoff
    #[default]
    Exponential,
}

/// Container test settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestConfig {
    /// TCP port the engine listens on inside the container
    pub port: u16,

    /// Data directory mounted as tmpfs so nothing persists
    pub data_dir: String,

    /// Extra `docker run` arguments (environment, command overrides)
    #[serde(default)]
    pub run_args: Vec<String>,

    /// Upper bound on waiting for the port to accept connections
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Grace period passed to `docker stop`
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,

    /// Named assertions run against each container
    #[serde(default)]
    pub assertions: Vec<AssertionConfig>,
}

fn default_readiness_timeout() -> u64 {
    60
}
fn default_poll_interval() -> u64 {
    500
}
fn default_stop_grace() -> u64 {
    10
}

/// A named container assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssertionConfig {
    pub name: String,

    #[serde(flatten)]
    pub check: AssertionCheck,
}

/// What an assertion verifies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AssertionCheck {
    /// Run a command inside the container; it must exit 0 and, when set,
    /// print `expect` somewhere on stdout
    Exec {
        command: Vec<String>,
        #[serde(default)]
        expect: Option<String>,
    },

    /// Container logs must contain `expect`
    Logs { expect: String },
}

/// Local paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Asset cache directory; defaults to the user cache dir
    #[serde(default)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Per-job log directory
    #[serde(default = "default_log_dir")]
    pub log_dir: Utf8PathBuf,

    /// Persisted matrix artifact
    #[serde(default = "default_matrix_file")]
    pub matrix_file: Utf8PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_dir: default_log_dir(),
            matrix_file: default_matrix_file(),
        }
    }
}

impl PathsConfig {
    /// Configured cache dir, else `<user cache dir>/keel`, else `.keel-cache`
    pub fn resolved_cache_dir(&self) -> Utf8PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .map(|dir| dir.join("keel"))
            .unwrap_or_else(|| Utf8PathBuf::from(".keel-cache"))
    }
}

fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("logs")
}
fn default_matrix_file() -> Utf8PathBuf {
    Utf8PathBuf::from("matrix.json")
}
