//! Matrix command

use super::Context;
use crate::cli::RefreshArgs;
use crate::output;
use anyhow::{Context as _, Result};
use keel_matrix::refresh_from_github;

pub async fn refresh(args: RefreshArgs, ctx: &Context) -> Result<()> {
    let upstream = &ctx.config.upstream;
    output::info(&format!(
        "Resolving releases of {}/{}{}",
        upstream.owner,
        upstream.repo,
        if args.offline { " (offline)" } else { "" }
    ));

    let (outcome, stats) = refresh_from_github(&ctx.config, args.offline)
        .await
        .context("Matrix refresh failed")?;

    if outcome.matrix.is_empty() {
        output::warning("No stable releases found upstream");
    }
    output::kv("entries", &outcome.matrix.len().to_string());
    output::kv(
        "cache",
        &format!("{} hits, {} misses", stats.hits, stats.misses),
    );

    if outcome.changed {
        output::success(&format!("Wrote {}", outcome.path));
    } else {
        output::success(&format!("{} is up to date", outcome.path));
    }
    Ok(())
}
