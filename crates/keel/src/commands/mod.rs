//! CLI command implementations

pub mod build;
pub mod list;
pub mod matrix;

use crate::cli::TargetArgs;
use crate::output;
use anyhow::{bail, Context as _, Result};
use camino::Utf8Path;
use keel_core::types::{BuildTarget, DistributionVariant};
use keel_core::{ConfigLoader, KeelConfig};
use keel_matrix::{enumerate_targets, Matrix, TargetFilter};
use keel_runner::RunSummary;

/// Loaded configuration plus global flags
pub struct Context {
    pub config: KeelConfig,
    pub verbose: bool,
}

impl Context {
    pub fn load(config_path: Option<&Utf8Path>, verbose: bool) -> Result<Self> {
        let loader = match config_path {
            Some(path) => ConfigLoader::with_file(path),
            None => ConfigLoader::new(),
        };
        let config = loader.load().context("Failed to load configuration")?;
        Ok(Self { config, verbose })
    }
}

/// Turn CLI filters into a [`TargetFilter`], rejecting unknown variants
pub fn target_filter(args: &TargetArgs, config: &KeelConfig) -> Result<TargetFilter> {
    let variant = match &args.variant {
        Some(name) => {
            let variant = DistributionVariant::new(name.as_str());
            if !config.variants.contains(&variant) {
                return Err(keel_core::Error::unknown_variant(name.as_str()).into());
            }
            Some(variant)
        }
        None => None,
    };
    Ok(TargetFilter::new(args.version_prefix.clone(), variant))
}

/// Load the persisted matrix and enumerate targets for `args`
pub fn select_targets(args: &TargetArgs, config: &KeelConfig) -> Result<Vec<BuildTarget>> {
    let filter = target_filter(args, config)?;
    let matrix = Matrix::load(&config.paths.matrix_file)?;
    Ok(enumerate_targets(&matrix, &filter)?)
}

/// Print the outcome of a run; failed jobs make the command fail
pub fn report(action: &str, summary: &RunSummary) -> Result<()> {
    if summary.is_success() {
        output::success(&format!(
            "All {} {} jobs succeeded",
            summary.total(),
            action
        ));
        return Ok(());
    }

    output::header(&format!("{} failures", action));
    for failure in summary.failures() {
        output::error(&failure.label);
        if let Err(e) = &failure.result {
            output::kv("error", &e.to_string());
        }
        output::kv("log", failure.log_path.as_str());
    }

    bail!(
        "{} of {} {} jobs failed",
        summary.failed(),
        summary.total(),
        action
    )
}
