//! gnomAD variants worker main executable

pub mod common;
pub mod conf;
pub mod err;
pub mod region;
pub mod server;
pub mod variants;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Merged gnomAD exome and genome variants",
    long_about = "This tool merges gnomAD exome and genome variant summaries for genomic regions"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Region-related commands.
    Region(Region),
    /// Server related commands.
    Server(Server),
}

/// Parsing of "region *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Region {
    /// The sub command to run
    #[command(subcommand)]
    command: RegionCommands,
}

/// Enum supporting the parsing of "region *" sub commands.
#[derive(Debug, Subcommand)]
enum RegionCommands {
    Query(region::query::Args),
}

/// Parsing of "server *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Server {
    /// The sub command to run
    #[command(subcommand)]
    command: ServerCommands,
}

/// Enum supporting the parsing of "server *" sub commands.
#[derive(Debug, Subcommand)]
enum ServerCommands {
    Rest(server::rest::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(common::tracing_level(&cli.common))
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Region(region) => match &region.command {
                RegionCommands::Query(args) => {
                    region::query::run(&cli.common, args)?;
                }
            },
            Commands::Server(server) => match &server.command {
                ServerCommands::Rest(args) => server::rest::run(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
