//! Keel CLI - container image matrix for a database engine
//!
//! This is the main entry point for the Keel command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, MatrixCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let ctx = commands::Context::load(cli.config.as_deref(), cli.verbose > 0)?;

    match cli.command {
        Commands::Matrix(MatrixCommands::Refresh(args)) => commands::matrix::refresh(args, &ctx).await,
        Commands::List(args) => commands::list::run(args, &ctx),
        Commands::Build(args) => commands::build::run(args, &ctx, false).await,
        Commands::Publish(args) => commands::build::run(args, &ctx, true).await,
        Commands::Test(args) => commands::test::run(args, &ctx).await,
    }
}

/// Initialize tracing with appropriate verbosity
///
/// `RUST_LOG` wins when set.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("info"),
                1 => EnvFilter::new("debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
