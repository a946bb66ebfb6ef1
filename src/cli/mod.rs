//! Command line interface definitions.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tabrec", about = "Tab audio capture service", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the capture service (default when no command is given)
    Serve,
    /// Print version information
    Version,
}
