//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Keel - build, test and publish a database engine image matrix
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv); also echoes job output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to keel.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Release matrix management
    #[command(subcommand)]
    Matrix(MatrixCommands),

    /// List build targets
    List(ListArgs),

    /// Build images locally
    Build(BuildArgs),

    /// Build and push images for every available architecture
    Publish(BuildArgs),

    /// Run container tests against built images
    Test(TestArgs),
}

#[derive(Subcommand, Debug)]
pub enum MatrixCommands {
    /// Resolve upstream releases and rewrite the matrix file
    Refresh(RefreshArgs),
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Use only the asset cache; a cache miss is an error
    #[arg(long)]
    pub offline: bool,
}

/// Target selection shared by every target command
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Only versions starting with this prefix (e.g. 5, 5.0, 5.0.2)
    #[arg(long = "version", value_name = "PREFIX")]
    pub version_prefix: Option<String>,

    /// Only this distribution variant
    #[arg(long)]
    pub variant: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Build every available architecture instead of only the host's
    #[arg(long)]
    pub all_platforms: bool,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Only run the named assertion (repeatable)
    #[arg(long = "test", value_name = "NAME")]
    pub tests: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_filters_parse() {
        let cli = Cli::parse_from([
            "keel", "-vv", "test", "--version", "5", "--variant", "noble", "--test", "select-one",
            "--test", "startup-banner",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Test(args) => {
                assert_eq!(args.targets.version_prefix.as_deref(), Some("5"));
                assert_eq!(args.targets.variant.as_deref(), Some("noble"));
                assert_eq!(args.tests, ["select-one", "startup-banner"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_matrix_refresh_offline() {
        let cli = Cli::parse_from(["keel", "matrix", "refresh", "--offline"]);
        assert!(matches!(
            cli.command,
            Commands::Matrix(MatrixCommands::Refresh(RefreshArgs { offline: true }))
        ));
    }
}
