//! Build and publish commands

use super::{report, select_targets, Context};
use crate::cli::BuildArgs;
use crate::output;
use anyhow::Result;
use keel_runner::{BuildAction, BuildMode, DockerCli, Orchestrator, TargetAction};
use std::sync::Arc;

pub async fn run(args: BuildArgs, ctx: &Context, publish: bool) -> Result<()> {
    let targets = select_targets(&args.targets, &ctx.config)?;
    let runtime = Arc::new(DockerCli::detect()?);

    let mode = match (publish, args.all_platforms) {
        (true, _) => BuildMode::Publish,
        (false, true) => BuildMode::AllPlatforms,
        (false, false) => BuildMode::Local,
    };
    let action = Arc::new(BuildAction::new(runtime, ctx.config.image.clone(), mode));
    output::info(&format!(
        "{} {} targets, logs in {}",
        if publish { "Publishing" } else { "Building" },
        targets.len(),
        ctx.config.paths.log_dir
    ));

    let orchestrator = Orchestrator::new(ctx.config.paths.log_dir.clone(), ctx.verbose);
    let name = action.name();
    let summary = orchestrator.run_targets(action, targets).await?;
    report(name, &summary)
}
