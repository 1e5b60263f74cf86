//! Photo Curator CLI - keep the photos with people in them.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{run::RunArgs, Cli, Commands, ExitCode};
use config::AppConfig;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();

    let exit_code = match cli.command {
        Some(Commands::Run(args)) => run(args, &config, cli.models_dir),
        Some(Commands::Models(ref args)) => {
            if let Some(dir) = cli.models_dir.or_else(|| config.models.dir.clone()) {
                photo_curator_adapters::set_models_dir(dir);
            }
            match commands::models::run(args) {
                Ok(()) => ExitCode::Success,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    ExitCode::Fatal
                }
            }
        }
        None => run(cli.run, &config, cli.models_dir),
    };

    exit_code.into()
}

fn run(args: RunArgs, config: &AppConfig, models_dir: Option<std::path::PathBuf>) -> ExitCode {
    let args = RunArgs::with_config(args, config, models_dir);
    match commands::run::run(&args) {
        Ok((_, code)) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Fatal
        }
    }
}
