//! Image build and publish
//!
//! Builds go through `docker buildx build`. A local build loads the host
//! architecture into the local image store; publishing builds every
//! architecture the release has a download for and pushes the manifest list.
//! Rebuilding the same target only re-tags, so re-runs are safe.

use super::TargetAction;
use crate::error::{Result, RunnerError};
use crate::job::JobLog;
use crate::runtime::ContainerRuntime;
use async_trait::async_trait;
use keel_core::types::{Architecture, BuildTarget, ImageConfig};
use std::sync::Arc;
use tracing::info;

/// Where built images end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Host architecture only, loaded into the local image store
    Local,
    /// Every available architecture, kept in the build cache
    AllPlatforms,
    /// Every available architecture, pushed to the registry
    Publish,
}

/// Render the build context template for a target
pub fn render_context(template: &str, target: &BuildTarget) -> String {
    template
        .replace("{major}", &target.version.major().to_string())
        .replace("{variant}", target.variant.as_str())
        .replace("{version}", &target.version.to_string())
}

fn platforms(target: &BuildTarget, mode: BuildMode) -> Result<Vec<Architecture>> {
    let available = target.release.architectures();
    match mode {
        BuildMode::Local => {
            let host = Architecture::host().ok_or_else(|| {
                RunnerError::job_failure("build", "host architecture is not supported")
            })?;
            if available.contains(&host) {
                Ok(vec![host])
            } else {
                Err(RunnerError::job_failure(
                    "build",
                    format!("{} has no {} download", target.version, host),
                ))
            }
        }
        BuildMode::AllPlatforms | BuildMode::Publish => {
            if available.is_empty() {
                Err(RunnerError::job_failure(
                    "build",
                    format!("{} has no downloads", target.version),
                ))
            } else {
                Ok(available)
            }
        }
    }
}

/// `docker` arguments building `target`
pub fn build_command(
    target: &BuildTarget,
    image: &ImageConfig,
    mode: BuildMode,
) -> Result<Vec<String>> {
    let platforms = platforms(target, mode)?;
    let mut args: Vec<String> = vec!["buildx".into(), "build".into()];

    args.push("--platform".into());
    args.push(
        platforms
            .iter()
            .map(|a| a.platform())
            .collect::<Vec<_>>()
            .join(","),
    );

    let mut build_arg = |key: String, value: &str| {
        args.push("--build-arg".into());
        args.push(format!("{}={}", key, value));
    };
    build_arg("VERSION".into(), &target.version.to_string());
    for arch in &platforms {
        if let Some(download) = target.release.downloads.get(arch) {
            let suffix = arch.as_str().to_uppercase();
            build_arg(format!("DOWNLOAD_URL_{}", suffix), &download.url);
            build_arg(format!("SHA256_{}", suffix), &download.sha256);
        }
    }
    for (key, value) in &image.build_args {
        build_arg(key.clone(), value);
    }

    let labels = [
        ("org.opencontainers.image.version", target.version.to_string()),
        ("org.opencontainers.image.description", image.description.clone()),
        ("org.opencontainers.image.source", image.source.clone()),
    ];
    for (key, value) in labels {
        args.push("--label".into());
        args.push(format!("{}={}", key, value));
    }

    for tag in &target.tags {
        args.push("--tag".into());
        args.push(image.reference(tag));
    }

    match mode {
        BuildMode::Local => args.push("--load".into()),
        BuildMode::Publish => args.push("--push".into()),
        BuildMode::AllPlatforms => {}
    }

    args.push(render_context(&image.context, target));
    Ok(args)
}

/// Builds (and optionally pushes) one image per target
pub struct BuildAction {
    runtime: Arc<dyn ContainerRuntime>,
    image: ImageConfig,
    mode: BuildMode,
}

impl BuildAction {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, image: ImageConfig, mode: BuildMode) -> Self {
        Self {
            runtime,
            image,
            mode,
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }
}

#[async_trait]
impl TargetAction for BuildAction {
    fn name(&self) -> &'static str {
        match self.mode {
            BuildMode::Publish => "publish",
            BuildMode::Local | BuildMode::AllPlatforms => "build",
        }
    }

    async fn run(&self, target: &BuildTarget, log: &JobLog) -> Result<()> {
        let args = build_command(target, &self.image, self.mode)?;
        info!("{}: {} {}", target.label(), self.name(), target.primary_tag());
        self.runtime.build(&args, log).await?;
        log.line(&format!("# built {}", self.image.reference(target.primary_tag())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::types::{DownloadDescriptor, ReleaseAsset};
    use keel_core::EngineVersion;
    use std::collections::BTreeMap;

    fn target(archs: &[Architecture]) -> BuildTarget {
        let downloads: BTreeMap<_, _> = archs
            .iter()
            .map(|a| {
                (
                    *a,
                    DownloadDescriptor {
                        url: format!("https://x/db-5.0.2-{}.tgz", a),
                        sha256: format!("sha-{}", a),
                    },
                )
            })
            .collect();
        let version = EngineVersion::parse("5.0.2").unwrap();
        BuildTarget {
            version: version.clone(),
            variant: "noble".into(),
            release: ReleaseAsset { version, downloads },
            tags: vec!["noble".into(), "5-noble".into(), "5.0.2-noble".into()],
        }
    }

    fn image() -> ImageConfig {
        ImageConfig {
            repository: "acme/db".to_string(),
            description: "Database".to_string(),
            source: "https://github.com/acme/db-docker".to_string(),
            context: "{major}/{variant}".to_string(),
            build_args: BTreeMap::new(),
        }
    }

    #[test]
    fn test_render_context() {
        let t = target(&[Architecture::Amd64]);
        assert_eq!(render_context("{major}/{variant}", &t), "5/noble");
        assert_eq!(render_context("images/{version}", &t), "images/5.0.2");
    }

    #[test]
    fn test_publish_command_covers_every_arch_and_tag() {
        let t = target(&[Architecture::Amd64, Architecture::Arm64]);
        let args = build_command(&t, &image(), BuildMode::Publish).unwrap();
        let line = args.join(" ");

        assert!(line.starts_with("buildx build --platform linux/amd64,linux/arm64"));
        assert!(line.contains("--build-arg SHA256_ARM64=sha-arm64"));
        assert!(line.contains("--build-arg DOWNLOAD_URL_AMD64=https://x/db-5.0.2-amd64.tgz"));
        assert!(line.contains("--label org.opencontainers.image.version=5.0.2"));
        assert!(line.contains("--tag acme/db:noble --tag acme/db:5-noble --tag acme/db:5.0.2-noble"));
        assert!(line.ends_with("--push 5/noble"));
    }

    #[test]
    fn test_all_platforms_without_downloads_fails() {
        let t = target(&[]);
        let err = build_command(&t, &image(), BuildMode::AllPlatforms).unwrap_err();
        assert!(matches!(err, RunnerError::JobFailure { .. }));
    }

    #[test]
    fn test_local_build_loads_host_arch() {
        let Some(host) = Architecture::host() else {
            return;
        };
        let args = build_command(&target(&Architecture::ALL), &image(), BuildMode::Local).unwrap();
        assert_eq!(args[3], host.platform());
        assert!(args.contains(&"--load".to_string()));
    }
}
