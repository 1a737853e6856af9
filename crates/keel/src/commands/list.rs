//! List command

use super::{select_targets, Context};
use crate::cli::ListArgs;
use anyhow::Result;
use keel_core::types::BuildTarget;
use tabled::{settings::Style, Table, Tabled};

/// Row of the target table
#[derive(Tabled)]
struct TargetRow {
    version: String,
    variant: String,
    architectures: String,
    tags: String,
}

impl From<&BuildTarget> for TargetRow {
    fn from(target: &BuildTarget) -> Self {
        Self {
            version: target.version.to_string(),
            variant: target.variant.to_string(),
            architectures: target
                .release
                .architectures()
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            tags: target.tags.join(", "),
        }
    }
}

pub fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let targets = select_targets(&args.targets, &ctx.config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    let rows: Vec<TargetRow> = targets.iter().map(TargetRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}
