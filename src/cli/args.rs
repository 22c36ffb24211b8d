//! CLI argument parsing structures.

use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;

use super::commands::Commands;

/// Main CLI structure for aitk.
#[derive(Parser, Debug)]
#[command(name = "aitk", version)]
#[command(about = "AI toolkit: credentials and an encrypted .env store", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments available to all commands.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Project directory (default: current directory)
    #[arg(short = 'C', long = "dir", global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). AITK_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// The project directory to operate on, always absolute.
    pub fn project_dir(&self) -> std::io::Result<PathBuf> {
        match &self.dir {
            Some(dir) => std::path::absolute(dir),
            None => std::env::current_dir(),
        }
    }
}
