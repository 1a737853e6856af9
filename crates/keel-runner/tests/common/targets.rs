//! Build target factories

use camino::Utf8PathBuf;
use keel_core::types::{Architecture, BuildTarget, DownloadDescriptor, ReleaseAsset};
use keel_core::EngineVersion;
use keel_runner::JobLog;
use std::collections::BTreeMap;
use tempfile::TempDir;

/// Target with downloads for both architectures and a single exact tag
pub fn target(version: &str, variant: &str) -> BuildTarget {
    let version = EngineVersion::parse(version).expect("valid version");
    let downloads = Architecture::ALL
        .iter()
        .map(|arch| {
            (
                *arch,
                DownloadDescriptor {
                    url: format!("https://downloads.example.com/db-{}-{}.tgz", version, arch),
                    sha256: format!("sha-{}-{}", version, arch),
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    let tag = if variant == "bookworm" {
        version.to_string()
    } else {
        format!("{}-{}", version, variant)
    };

    BuildTarget {
        version: version.clone(),
        variant: variant.into(),
        release: ReleaseAsset { version, downloads },
        tags: vec![tag],
    }
}

/// `count` distinct bookworm targets: 5.0.0, 5.0.1, ...
pub fn targets(count: usize) -> Vec<BuildTarget> {
    (0..count)
        .map(|i| target(&format!("5.0.{}", i), "bookworm"))
        .collect()
}

/// Temporary directory as a UTF-8 path
pub fn temp_dir() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    (temp, path)
}

/// A job log in a fresh temp dir
pub fn job_log(label: &str) -> (TempDir, JobLog) {
    let (temp, dir) = temp_dir();
    let log = JobLog::create(&dir, label, false).expect("job log");
    (temp, log)
}
