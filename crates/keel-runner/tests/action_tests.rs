//! Tests for the build and test actions against a fake runtime

mod common;

use common::*;
use keel_core::types::{AssertionCheck, AssertionConfig, ImageConfig, TestConfig};
use keel_runner::actions::select_assertions;
use keel_runner::{BuildAction, BuildMode, Orchestrator, RunnerError, TargetAction, TestAction};
use std::collections::BTreeMap;
use std::sync::Arc;

fn image() -> ImageConfig {
    ImageConfig {
        repository: "acme/db".to_string(),
        description: "Database".to_string(),
        source: "https://github.com/acme/db-docker".to_string(),
        context: "{major}/{variant}".to_string(),
        build_args: BTreeMap::from([("BASE_MIRROR".to_string(), "mirror.local".to_string())]),
    }
}

fn test_config() -> TestConfig {
    TestConfig {
        port: 5000,
        data_dir: "/var/lib/db".to_string(),
        run_args: vec!["--env".to_string(), "DB_MODE=test".to_string()],
        readiness_timeout_secs: 1,
        poll_interval_ms: 20,
        stop_grace_secs: 1,
        assertions: vec![
            AssertionConfig {
                name: "startup-banner".to_string(),
                check: AssertionCheck::Logs {
                    expect: "ready to accept connections".to_string(),
                },
            },
            AssertionConfig {
                name: "select-one".to_string(),
                check: AssertionCheck::Exec {
                    command: vec!["db-cli".to_string(), "SELECT 1".to_string()],
                    expect: Some("1".to_string()),
                },
            },
        ],
    }
}

fn test_action(runtime: Arc<FakeRuntime>, names: &[String]) -> TestAction {
    let config = test_config();
    let assertions = select_assertions(&config.assertions, names).unwrap();
    TestAction::new(runtime, image(), config, assertions)
}

#[tokio::test]
async fn test_passing_assertions() {
    let runtime = Arc::new(
        FakeRuntime::new(Startup::Listening)
            .with_logs("ready to accept connections\n")
            .with_exec("db-cli SELECT 1", 0, "1\n"),
    );
    let action = test_action(runtime.clone(), &[]);
    let (_temp, log) = job_log("5.0.2/bookworm");

    action.run(&target("5.0.2", "bookworm"), &log).await.unwrap();

    assert!(runtime.calls().contains(&"run acme/db:5.0.2".to_string()));
    assert!(runtime.live_containers().is_empty());
}

#[tokio::test]
async fn test_failing_assertion_is_named() {
    let runtime = Arc::new(
        FakeRuntime::new(Startup::Listening)
            .with_logs("ready to accept connections\n")
            .with_exec("db-cli SELECT 1", 1, ""),
    );
    let action = test_action(runtime.clone(), &[]);
    let (_temp, log) = job_log("5.0.2/noble");

    let err = action
        .run(&target("5.0.2", "noble"), &log)
        .await
        .unwrap_err();

    assert_eq!(err.failed_assertion(), Some("select-one"));
    assert!(runtime.live_containers().is_empty());
}

#[tokio::test]
async fn test_filter_runs_only_named_assertions() {
    let runtime = Arc::new(FakeRuntime::new(Startup::Listening).with_exec("db-cli SELECT 1", 0, "1"));
    let action = test_action(runtime.clone(), &["select-one".to_string()]);
    let (_temp, log) = job_log("5.0.2/bookworm");

    action.run(&target("5.0.2", "bookworm"), &log).await.unwrap();

    assert!(!runtime.calls().iter().any(|c| c.starts_with("logs")));
}

#[tokio::test]
async fn test_publish_builds_fail_independently() {
    let (_temp, dir) = temp_dir();
    let runtime = Arc::new(FakeRuntime::new(Startup::Listening).failing_build_for("acme/db:5.0.1"));
    let action = Arc::new(BuildAction::new(runtime.clone(), image(), BuildMode::Publish));

    let summary = Orchestrator::new(dir, false)
        .run_targets(action, targets(3))
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    let failed = summary.failures().next().unwrap();
    assert_eq!(failed.label, "5.0.1/bookworm");
    assert!(matches!(failed.result, Err(RunnerError::JobFailure { .. })));

    let builds = runtime.builds();
    assert_eq!(builds.len(), 3);
    for args in &builds {
        assert!(args.contains(&"--push".to_string()));
        assert!(args.contains(&"BASE_MIRROR=mirror.local".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("5/bookworm"));
    }
    assert!(summary.outcomes[0].log_path.as_str().contains("publish"));
}
