//! Models command - manage ML models.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use photo_curator_adapters::models::{
    ensure_models_with_progress, list_models as adapter_list_models, models_dir, ModelKind,
    ProgressCallback, DEFAULT_DETECTOR,
};

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download models (the default detector when none are named)
    Fetch {
        /// Registry names, e.g. yolov8s
        names: Vec<String>,
    },
    /// List known models and whether they are installed
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs) -> Result<()> {
    match &args.command {
        ModelsCommand::Fetch { names } => fetch_models(names),
        ModelsCommand::List => {
            list_models();
            Ok(())
        }
        ModelsCommand::Path => {
            println!("{}", models_dir().display());
            Ok(())
        }
    }
}

fn fetch_models(names: &[String]) -> Result<()> {
    let names: Vec<&str> = if names.is_empty() {
        vec![DEFAULT_DETECTOR]
    } else {
        names.iter().map(String::as_str).collect()
    };

    let pb = Arc::new(ProgressBar::new(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    let current_model: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let pb_clone = Arc::clone(&pb);
    let model_clone = Arc::clone(&current_model);

    let progress: ProgressCallback =
        Box::new(move |name: &str, downloaded: u64, total: Option<u64>| {
            let is_new_model = {
                let mut current = model_clone.lock().unwrap_or_else(PoisonError::into_inner);
                if *current == name {
                    false
                } else {
                    *current = name.to_string();
                    true
                }
            };
            if is_new_model {
                pb_clone.set_length(total.unwrap_or(0));
                pb_clone.set_message(name.to_string());
            }
            pb_clone.set_position(downloaded);
        });

    let paths = ensure_models_with_progress(&names, Some(&progress))?;

    pb.finish_and_clear();
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn list_models() {
    let models = adapter_list_models();

    println!("Models directory: {}", models_dir().display());
    println!();

    for (info, installed) in &models {
        let status = if *installed { "✓" } else { "✗" };
        let kind = match info.kind {
            ModelKind::Detector => "detector",
            ModelKind::Attributes => "attributes",
        };
        println!(
            "  {status} {} ({}, {kind}) - {}",
            info.name, info.filename, info.description
        );
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}
