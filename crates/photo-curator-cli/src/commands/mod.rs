//! CLI command definitions and handlers.

pub mod models;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Photo Curator - keep the photos with people in them
#[derive(Parser)]
#[command(name = "photo-curator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shared run arguments (root folder, policy, thresholds).
    #[command(flatten)]
    pub run: run::RunArgs,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Curate a folder of photos
    Run(run::RunArgs),
    /// Manage ML models
    Models(models::ModelsArgs),
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every file was processed.
    Success = 0,
    /// The run finished but some files failed.
    FilesFailed = 1,
    /// The run could not start or was aborted.
    Fatal = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
