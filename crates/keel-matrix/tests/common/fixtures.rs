//! Test configurations

use keel_core::{ConfigLoader, KeelConfig};

/// Embedded defaults with three variants and no exclusions
pub fn default_config() -> KeelConfig {
    ConfigLoader::from_yaml_str("{}").expect("embedded defaults are valid")
}

/// Defaults with `trixie` excluded for major 4
pub fn config_with_exclusions() -> KeelConfig {
    ConfigLoader::from_yaml_str(
        r#"
variants:
  exclusions:
    4: [trixie]
"#,
    )
    .expect("valid config")
}

/// Defaults pointed at a mock API with a fast, single-retry policy
pub fn config_for_server(api_url: &str, per_page: u32) -> KeelConfig {
    ConfigLoader::from_yaml_str(&format!(
        r#"
upstream:
  api-url: {api_url}
  owner: acme
  repo: db
  per-page: {per_page}
retry:
  max-attempts: 2
  strategy: fixed
  initial-delay-ms: 10
  max-delay-ms: 10
network:
  http-timeout-secs: 5
"#
    ))
    .expect("valid config")
}
